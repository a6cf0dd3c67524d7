use crate::connection::{Connection, ConnectionSettings};
use crate::message::{LoggingHandler, MessageDispatcher, SessionHandler};
use crate::server::config::ServerConfig;
use crate::server::registry::ConnectionRegistry;
use crate::server::bind_server;
use crate::Result;
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use uuid::Uuid;

/// Pause after a failed accept before retrying
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct RtmpServer {
    /// Server configuration
    config: Arc<ServerConfig>,

    /// Live connections
    registry: Arc<ConnectionRegistry>,

    /// Shared by every connection
    dispatcher: MessageDispatcher,

    /// Flipped to true once by `shutdown`
    shutdown: watch::Sender<bool>,
}

impl RtmpServer {
    /// Create a server whose sessions only log what they receive
    pub fn new(config: ServerConfig) -> Self {
        Self::with_handler(config, Arc::new(LoggingHandler))
    }

    pub fn with_handler(config: ServerConfig, handler: Arc<dyn SessionHandler>) -> Self {
        let (shutdown, _) = watch::channel(false);
        RtmpServer {
            config: Arc::new(config),
            registry: Arc::new(ConnectionRegistry::new()),
            dispatcher: MessageDispatcher::new(handler),
            shutdown,
        }
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registry of live connections, suitable as a metrics source
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Bind the configured address and accept until shutdown
    pub async fn listen(&self) -> Result<()> {
        self.config.validate()?;
        let listener = bind_server(&self.config).await?;
        info!("RTMP server listening on {}", self.config.bind_address());
        self.serve_listener(listener).await
    }

    /// Accept from an already bound listener until shutdown
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        accept_backoff(&e).await;
                        continue;
                    }
                },
                _ = shutdown.changed() => continue,
            };

            if self.registry.len() >= self.config.max_connections {
                warn!("Connection limit reached, rejecting {}", peer_addr);
                drop(stream);
                continue;
            }

            self.spawn_connection(stream, peer_addr);
        }

        info!("RTMP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        let id = Uuid::new_v4().to_string();
        let peer = peer_addr.to_string();
        info!("[{}] new connection from {}", id, peer);

        self.registry.register(id.clone(), Some(peer.clone()));
        let connection = self.connection(&id, peer);
        let registry = self.registry.clone();

        tokio::spawn(async move {
            if let Err(e) = connection.run(stream).await {
                debug!("[{}] deregistered after {} error", id, e.category());
            }
            registry.remove(&id);
        });
    }

    /// Serve one already accepted stream in the current task.
    ///
    /// The connection is registered for its lifetime and counts toward
    /// `max_connections` like an accepted socket would.
    pub async fn serve_stream<S>(&self, stream: S, peer: impl Into<String>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let peer = peer.into();
        self.registry.register(id.clone(), Some(peer.clone()));

        let result = self.connection(&id, peer).run(stream).await;
        self.registry.remove(&id);
        result
    }

    fn connection(&self, id: &str, peer: String) -> Connection {
        Connection::new(
            id,
            ConnectionSettings::from(self.config.as_ref()),
            self.dispatcher.clone(),
        )
        .with_peer(peer)
        .with_registry(self.registry.clone())
        .with_shutdown(self.shutdown.subscribe())
    }

    /// Stop accepting and tell every live connection to close
    pub fn shutdown(&self) {
        debug!("shutdown requested with {} live connections", self.registry.len());
        self.shutdown.send_replace(true);
    }

    /// Get active connections count
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

async fn accept_backoff(e: &io::Error) {
    error!("Accept error: {}, retrying in {:?}", e, ACCEPT_ERROR_BACKOFF);
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}
