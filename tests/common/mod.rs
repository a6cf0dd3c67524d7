// Shared helpers for the integration tests

#![allow(dead_code)]

use rtmp::{
    client_handshake, create_response, Amf0Object, Amf0Value, ChunkReader, ChunkWriter,
    ConnectionHandle, ConnectionState, ControlMessage, HandshakeOptions, Result, RtmpCommand,
    RtmpMessage, RtmpServer, ServerConfig, SessionHandler, DEFAULT_WINDOW_SIZE,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Answers connect and publish, and remembers what it saw
#[derive(Default)]
pub struct TestHandler {
    pub commands: Mutex<Vec<String>>,
    pub media_sizes: Mutex<Vec<usize>>,
}

#[async_trait::async_trait]
impl SessionHandler for TestHandler {
    async fn on_command(
        &self,
        conn: &ConnectionHandle,
        message: &RtmpMessage,
        command: RtmpCommand,
    ) -> Result<()> {
        self.commands.lock().unwrap().push(command.name.clone());

        match command.name.as_str() {
            "connect" => {
                conn.send(ControlMessage::WindowAckSize(DEFAULT_WINDOW_SIZE).to_message())
                    .await?;
                conn.send(
                    ControlMessage::SetPeerBandwidth {
                        size: DEFAULT_WINDOW_SIZE,
                        limit_type: 2,
                    }
                    .to_message(),
                )
                .await?;

                let properties = Amf0Object::new()
                    .with("fmsVer", Amf0Value::string("FMS/3,0,1,123"))
                    .with("capabilities", Amf0Value::number(31));
                let info = Amf0Object::new()
                    .with("level", Amf0Value::string("status"))
                    .with("code", Amf0Value::string("NetConnection.Connect.Success"));
                conn.send(create_response(
                    message,
                    Amf0Value::Object(properties),
                    Amf0Value::Object(info),
                )?)
                .await
            }
            "publish" => {
                conn.set_state(ConnectionState::Publishing);
                conn.send_command(
                    &RtmpCommand::on_status("status", "NetStream.Publish.Start", "publishing"),
                    message.message_stream_id(),
                )
                .await
            }
            _ => Ok(()),
        }
    }

    async fn on_message(&self, _conn: &ConnectionHandle, message: RtmpMessage) -> Result<()> {
        self.media_sizes.lock().unwrap().push(message.len());
        Ok(())
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig::builder()
        .host("127.0.0.1")
        .read_timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build config")
}

/// Serve on an ephemeral local port
pub async fn start_server(
    config: ServerConfig,
    handler: Arc<TestHandler>,
) -> (Arc<RtmpServer>, SocketAddr, JoinHandle<Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RtmpServer::with_handler(config, handler));

    let task = {
        let server = server.clone();
        tokio::spawn(async move { server.serve_listener(listener).await })
    };
    (server, addr, task)
}

/// Minimal client side of a connection: handshake plus chunk I/O
pub struct TestClient {
    pub stream: TcpStream,
    pub reader: ChunkReader,
    pub writer: ChunkWriter,
    /// Last Window Acknowledgement Size the server announced
    pub window_ack_size: Option<u32>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let mut stream = TcpStream::connect(addr).await?;
        client_handshake(&mut stream, HandshakeOptions::default()).await?;

        let mut reader = ChunkReader::new();
        reader.set_read_timeout(Some(Duration::from_secs(5)));
        Ok(TestClient {
            stream,
            reader,
            writer: ChunkWriter::new(),
            window_ack_size: None,
        })
    }

    pub async fn send(&mut self, message: &RtmpMessage) -> Result<()> {
        self.writer.write_message(message, &mut self.stream).await
    }

    pub async fn send_command(&mut self, command: &RtmpCommand, stream_id: u32) -> Result<()> {
        let message = command.into_message(0, stream_id)?;
        self.send(&message).await
    }

    /// Next message, applying protocol control messages along the way
    pub async fn recv(&mut self) -> Result<RtmpMessage> {
        loop {
            let message = self.reader.read_message(&mut self.stream).await?;
            if !message.is_control() {
                return Ok(message);
            }
            match ControlMessage::parse(&message)? {
                ControlMessage::SetChunkSize(size) => self.reader.set_chunk_size(size as usize)?,
                ControlMessage::WindowAckSize(size) => self.window_ack_size = Some(size),
                _ => {}
            }
        }
    }

    pub async fn recv_command(&mut self) -> Result<RtmpCommand> {
        let message = self.recv().await?;
        RtmpCommand::decode(message.payload())
    }
}

/// Poll until `check` holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
