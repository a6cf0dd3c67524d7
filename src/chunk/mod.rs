mod header;
mod table;
mod reader;
mod writer;

pub use header::*;
pub use table::*;
pub use reader::*;
pub use writer::*;
