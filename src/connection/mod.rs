mod connection;
mod state;

pub use connection::*;
pub use state::*;
