use crate::{Error, Result};
use tokio::net::TcpListener;

mod config;
mod registry;
mod server;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use registry::*;
pub use server::RtmpServer;

/// Bind the configured address with SO_REUSEADDR set
pub async fn bind_server(config: &ServerConfig) -> Result<TcpListener> {
    let addr = config.bind_address();

    let socket = match addr.parse::<std::net::SocketAddr>() {
        Ok(addr) => {
            let socket = if addr.is_ipv4() {
                tokio::net::TcpSocket::new_v4()?
            } else {
                tokio::net::TcpSocket::new_v6()?
            };

            socket.set_reuseaddr(true)?;
            socket.bind(addr)?;
            socket
        }
        Err(e) => {
            return Err(Error::config(format!("Invalid address {}: {}", addr, e)));
        }
    };

    Ok(socket.listen(1024)?)
}
