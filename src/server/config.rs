use crate::protocol::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_STREAMS};
use crate::{Error, Result};
use std::time::Duration;

/// Outbound chunk sizes accepted by the builder
const MIN_OUTBOUND_CHUNK_SIZE: u32 = 128;
const MAX_OUTBOUND_CHUNK_SIZE: u32 = 65536;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Maximum connections
    pub max_connections: usize,

    /// Outbound chunk size
    pub chunk_size: u32,

    /// Per-connection chunk stream limit
    pub max_chunk_streams: usize,

    pub handshake_timeout: Duration,

    /// Deadline for each read once chunk traffic flows
    pub read_timeout: Duration,

    pub write_timeout: Duration,

    /// Check the digest on C2 as well as C1
    pub verify_peer_response: bool,

    /// Messages a session may queue before `send` waits
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 1935,
            max_connections: 1000,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunk_streams: MAX_CHUNK_STREAMS,
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            verify_peer_response: false,
            outbound_queue: 256,
        }
    }
}

impl ServerConfig {
    /// Create config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// `host:port` as passed to the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("Invalid port: 0"));
        }

        if self.max_connections == 0 {
            return Err(Error::config("Invalid max_connections: 0"));
        }

        if self.chunk_size < MIN_OUTBOUND_CHUNK_SIZE {
            return Err(Error::config(format!(
                "Chunk size must be at least {}",
                MIN_OUTBOUND_CHUNK_SIZE
            )));
        }

        if self.chunk_size > MAX_OUTBOUND_CHUNK_SIZE {
            return Err(Error::config(format!(
                "Chunk size must not exceed {}",
                MAX_OUTBOUND_CHUNK_SIZE
            )));
        }

        if self.max_chunk_streams == 0 {
            return Err(Error::config("Invalid max_chunk_streams: 0"));
        }

        if self.outbound_queue == 0 {
            return Err(Error::config("Invalid outbound_queue: 0"));
        }

        for (name, timeout) in [
            ("handshake_timeout", self.handshake_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::config(format!("Invalid {}: 0", name)));
            }
        }

        Ok(())
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        ServerConfigBuilder {
            config: ServerConfig::default(),
        }
    }

    /// Set host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set max connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn max_chunk_streams(mut self, max: usize) -> Self {
        self.config.max_chunk_streams = max;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn verify_peer_response(mut self, verify: bool) -> Self {
        self.config.verify_peer_response = verify;
        self
    }

    pub fn outbound_queue(mut self, capacity: usize) -> Self {
        self.config.outbound_queue = capacity;
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
