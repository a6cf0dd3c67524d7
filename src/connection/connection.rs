use crate::chunk::{ChunkReader, ChunkWriter};
use crate::connection::state::ConnectionState;
use crate::handshake::{Handshake, HandshakeOptions};
use crate::message::{ConnectionHandle, MessageDispatcher};
use crate::protocol::{ControlMessage, RtmpMessage, DEFAULT_CHUNK_SIZE, MAX_CHUNK_STREAMS};
use crate::server::{ConnectionRegistry, ServerConfig};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};

/// Per-connection knobs, usually derived from [`ServerConfig`]
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub handshake: HandshakeOptions,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    /// Outbound chunk size, announced to the peer when not the default
    pub chunk_size: u32,
    pub max_chunk_streams: usize,
    pub outbound_queue: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            handshake: HandshakeOptions::default(),
            read_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(10)),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunk_streams: MAX_CHUNK_STREAMS,
            outbound_queue: 256,
        }
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        ConnectionSettings {
            handshake: HandshakeOptions {
                timeout: Some(config.handshake_timeout),
                verify_peer_response: config.verify_peer_response,
            },
            read_timeout: Some(config.read_timeout),
            write_timeout: Some(config.write_timeout),
            chunk_size: config.chunk_size,
            max_chunk_streams: config.max_chunk_streams,
            outbound_queue: config.outbound_queue,
        }
    }
}

/// Server side of one RTMP connection.
///
/// `run` owns the stream for its whole life: handshake, then a read loop in
/// this task and a write loop in a spawned one. Dropping the stream is the
/// only cleanup either needs.
pub struct Connection {
    /// Connection ID
    id: String,

    peer: Option<String>,

    settings: ConnectionSettings,

    dispatcher: MessageDispatcher,

    registry: Option<Arc<ConnectionRegistry>>,

    /// Shutdown signal
    shutdown: Option<watch::Receiver<bool>>,
}

impl Connection {
    /// Create new connection
    pub fn new(id: impl Into<String>, settings: ConnectionSettings, dispatcher: MessageDispatcher) -> Self {
        Connection {
            id: id.into(),
            peer: None,
            settings,
            dispatcher,
            registry: None,
            shutdown: None,
        }
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Report state changes and chunk stream counts here
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Stop when the watched value turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Get connection ID
    pub fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&self, state: ConnectionState) {
        if let Some(registry) = &self.registry {
            registry.set_state(&self.id, state);
        }
    }

    /// Serve the connection until the peer leaves, an error occurs, or
    /// shutdown is signalled. Errors are logged here and also returned.
    pub async fn run<S>(self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut shutdown = self.shutdown.clone();
        let result = self.serve(stream, &mut shutdown).await;

        self.set_state(ConnectionState::Closed);
        match &result {
            Ok(()) => info!("[{}] connection closed", self.id),
            Err(e) => warn!("[{}] connection closed: {} error: {}", self.id, e.category(), e),
        }
        result
    }

    async fn serve<S>(&self, mut stream: S, shutdown: &mut Option<watch::Receiver<bool>>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.set_state(ConnectionState::Handshaking);
        let mut handshake = Handshake::server(self.settings.handshake);
        tokio::select! {
            result = handshake.run(&mut stream) => result?,
            _ = wait_shutdown(shutdown) => {
                debug!("[{}] shutdown during handshake", self.id);
                return Ok(());
            }
        }
        self.set_state(ConnectionState::Idle);
        debug!("[{}] handshake complete", self.id);

        let (mut read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.settings.outbound_queue.max(1));
        let handle = ConnectionHandle::new(
            self.id.clone(),
            self.peer.clone(),
            outbound_tx,
            self.registry.clone(),
        );

        let mut chunk_writer = ChunkWriter::new();
        chunk_writer.set_write_timeout(self.settings.write_timeout);
        let mut writer_task = tokio::spawn(write_loop(write_half, outbound_rx, chunk_writer));

        if self.settings.chunk_size != DEFAULT_CHUNK_SIZE {
            handle
                .send(ControlMessage::SetChunkSize(self.settings.chunk_size).to_message())
                .await?;
        }

        let session = async {
            self.dispatcher.handler().on_connect(&handle).await?;
            self.read_loop(&mut read_half, &handle).await
        };

        let result = tokio::select! {
            result = session => result,
            joined = &mut writer_task => match joined {
                Ok(result) => result,
                Err(e) => Err(Error::connection(format!("writer task failed: {}", e))),
            },
            _ = wait_shutdown(shutdown) => {
                debug!("[{}] shutting down", self.id);
                Ok(())
            }
        };

        writer_task.abort();
        self.dispatcher
            .handler()
            .on_disconnect(&handle, result.as_ref().err())
            .await;
        result
    }

    async fn read_loop<R>(&self, reader: &mut R, handle: &ConnectionHandle) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk_reader = ChunkReader::with_limit(self.settings.max_chunk_streams);
        chunk_reader.set_read_timeout(self.settings.read_timeout);
        let mut known_streams = 0;

        loop {
            let message = match chunk_reader.read_message(reader).await {
                Ok(message) => message,
                Err(e) if e.is_disconnect() => {
                    debug!("[{}] peer went away: {}", self.id, e);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if chunk_reader.table().len() != known_streams {
                known_streams = chunk_reader.table().len();
                if let Some(registry) = &self.registry {
                    registry.set_chunk_streams(&self.id, known_streams);
                }
            }

            if message.is_control() {
                self.handle_control(&mut chunk_reader, &message)?;
                continue;
            }

            self.dispatcher.dispatch(handle, message).await?;
        }
    }

    fn handle_control(&self, chunk_reader: &mut ChunkReader, message: &RtmpMessage) -> Result<()> {
        match ControlMessage::parse(message)? {
            ControlMessage::SetChunkSize(size) => {
                debug!("[{}] inbound chunk size {}", self.id, size);
                chunk_reader.set_chunk_size(size as usize)?;
            }
            ControlMessage::Abort(csid) => {
                let known = chunk_reader.abort(csid);
                debug!("[{}] abort csid {} (known: {})", self.id, csid, known);
            }
            ControlMessage::Acknowledgement(sequence) => {
                debug!("[{}] peer acknowledged {} bytes", self.id, sequence);
            }
            ControlMessage::WindowAckSize(size) => {
                debug!("[{}] peer window ack size {}", self.id, size);
            }
            ControlMessage::SetPeerBandwidth { size, limit_type } => {
                debug!("[{}] peer bandwidth {} (limit type {})", self.id, size, limit_type);
            }
        }
        Ok(())
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<RtmpMessage>,
    mut chunk_writer: ChunkWriter,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        chunk_writer.write_message(&message, &mut writer).await?;
    }
    Ok(())
}

/// Resolves once shutdown is requested; never if there is no signal
/// or its sender is gone.
async fn wait_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = shutdown else {
        return std::future::pending().await;
    };
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
