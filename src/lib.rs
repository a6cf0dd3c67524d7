mod utils;
mod amf;
mod protocol;
mod handshake;
mod chunk;
mod message;
mod connection;
mod server;
mod metrics;

// Re-export commonly used types at crate root
pub use utils::*;
pub use amf::*;
pub use protocol::*;
pub use handshake::*;
pub use chunk::*;
pub use message::*;
pub use connection::*;

// Server exports
pub use server::{bind_server, ConnectionRegistry, ConnectionSummary, RtmpServer, ServerConfig, ServerConfigBuilder};

// Metrics exports
pub use metrics::*;
