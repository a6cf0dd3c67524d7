use crate::amf::{decode_amf0_values, Amf0Value};
use crate::connection::ConnectionState;
use crate::message::types::{AmfVersion, MessageType};
use crate::protocol::{RtmpCommand, RtmpMessage};
use crate::server::ConnectionRegistry;
use crate::{Error, Result};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;

/// The session layer's side of a connection.
///
/// Control messages never reach it; everything else arrives through exactly
/// one of the three message callbacks.
#[async_trait::async_trait]
pub trait SessionHandler: Send + Sync {
    /// Handshake finished, chunk traffic may flow
    async fn on_connect(&self, _conn: &ConnectionHandle) -> Result<()> {
        Ok(())
    }

    /// Decoded AMF0 command (type 20)
    async fn on_command(
        &self,
        conn: &ConnectionHandle,
        message: &RtmpMessage,
        command: RtmpCommand,
    ) -> Result<()>;

    /// Decoded AMF0 data message (type 18)
    async fn on_data(
        &self,
        _conn: &ConnectionHandle,
        _message: &RtmpMessage,
        _values: Vec<Amf0Value>,
    ) -> Result<()> {
        Ok(())
    }

    /// Media, AMF3, user control and anything else, payload untouched
    async fn on_message(&self, _conn: &ConnectionHandle, _message: RtmpMessage) -> Result<()> {
        Ok(())
    }

    /// Connection is gone; `reason` is None on a clean close
    async fn on_disconnect(&self, _conn: &ConnectionHandle, _reason: Option<&Error>) {}
}

/// What a session handler may do to its connection.
///
/// Cheap to clone; all clones feed the same writer task.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: String,
    peer: Option<String>,
    outbound: mpsc::Sender<RtmpMessage>,
    registry: Option<Arc<ConnectionRegistry>>,
}

impl ConnectionHandle {
    pub fn new(
        id: impl Into<String>,
        peer: Option<String>,
        outbound: mpsc::Sender<RtmpMessage>,
        registry: Option<Arc<ConnectionRegistry>>,
    ) -> Self {
        ConnectionHandle {
            id: id.into(),
            peer,
            outbound,
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    /// Queue a message for the writer task
    pub async fn send(&self, message: RtmpMessage) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| Error::connection(format!("connection {} writer has stopped", self.id)))
    }

    pub async fn send_command(&self, command: &RtmpCommand, stream_id: u32) -> Result<()> {
        self.send(command.into_message(0, stream_id)?).await
    }

    /// Report what the session is doing with this connection.
    ///
    /// Returns false when the move is not allowed from the current state.
    /// Without a registry there is nothing to check and every move succeeds.
    pub fn set_state(&self, state: ConnectionState) -> bool {
        match &self.registry {
            Some(registry) => registry.set_state(&self.id, state),
            None => true,
        }
    }
}

/// Routes reassembled messages to a [`SessionHandler`].
#[derive(Clone)]
pub struct MessageDispatcher {
    handler: Arc<dyn SessionHandler>,
}

impl MessageDispatcher {
    /// Create new dispatcher
    pub fn new(handler: Arc<dyn SessionHandler>) -> Self {
        MessageDispatcher { handler }
    }

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    /// Dispatch message to the handler.
    ///
    /// AMF0 command and data payloads are decoded first; a decode failure is
    /// returned and the handler is not called.
    pub async fn dispatch(&self, conn: &ConnectionHandle, message: RtmpMessage) -> Result<()> {
        match MessageType::from_id(message.message_type()) {
            MessageType::Command(AmfVersion::Amf0) => {
                let command = RtmpCommand::decode(message.payload())?;
                debug!(
                    "[{}] command {} (transaction {})",
                    conn.id(),
                    command.name,
                    command.transaction_id
                );
                self.handler.on_command(conn, &message, command).await
            }
            MessageType::Data(AmfVersion::Amf0) => {
                let values = decode_amf0_values(message.payload())?;
                self.handler.on_data(conn, &message, values).await
            }
            _ => self.handler.on_message(conn, message).await,
        }
    }
}

/// Handler that only logs what it receives
pub struct LoggingHandler;

#[async_trait::async_trait]
impl SessionHandler for LoggingHandler {
    async fn on_command(
        &self,
        conn: &ConnectionHandle,
        message: &RtmpMessage,
        command: RtmpCommand,
    ) -> Result<()> {
        info!(
            "[{}] command {} on stream {} with {} arguments",
            conn.id(),
            command.name,
            message.message_stream_id(),
            command.arguments.len()
        );
        Ok(())
    }

    async fn on_message(&self, conn: &ConnectionHandle, message: RtmpMessage) -> Result<()> {
        debug!(
            "[{}] message type={} stream={} timestamp={} size={}",
            conn.id(),
            message.message_type(),
            message.message_stream_id(),
            message.timestamp(),
            message.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::encode_amf0_values;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SessionHandler for Recorder {
        async fn on_command(
            &self,
            _conn: &ConnectionHandle,
            _message: &RtmpMessage,
            command: RtmpCommand,
        ) -> Result<()> {
            self.seen.lock().unwrap().push(format!("command:{}", command.name));
            Ok(())
        }

        async fn on_data(
            &self,
            _conn: &ConnectionHandle,
            _message: &RtmpMessage,
            values: Vec<Amf0Value>,
        ) -> Result<()> {
            self.seen.lock().unwrap().push(format!("data:{}", values.len()));
            Ok(())
        }

        async fn on_message(&self, _conn: &ConnectionHandle, message: RtmpMessage) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("opaque:{}", message.message_type()));
            Ok(())
        }
    }

    fn handle() -> (ConnectionHandle, mpsc::Receiver<RtmpMessage>) {
        let (tx, rx) = mpsc::channel(4);
        (ConnectionHandle::new("test", None, tx, None), rx)
    }

    #[tokio::test]
    async fn test_dispatcher_routes_by_type() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = MessageDispatcher::new(recorder.clone());
        let (conn, _rx) = handle();

        let connect = RtmpCommand::connect("live", "rtmp://localhost/live")
            .into_message(0, 0)
            .unwrap();
        dispatcher.dispatch(&conn, connect).await.unwrap();

        let meta = encode_amf0_values(&[Amf0Value::string("@setDataFrame"), Amf0Value::Null]).unwrap();
        dispatcher
            .dispatch(&conn, RtmpMessage::data(meta, 0, 1))
            .await
            .unwrap();

        dispatcher
            .dispatch(&conn, RtmpMessage::audio(vec![1, 2, 3], 1000, 1))
            .await
            .unwrap();

        // AMF3 command stays opaque
        dispatcher
            .dispatch(&conn, RtmpMessage::new(3, 17, 0, 0, vec![0, 2, 0, 1, b'x']))
            .await
            .unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["command:connect", "data:2", "opaque:8", "opaque:17"]
        );
    }

    #[tokio::test]
    async fn test_bad_command_payload_is_codec_error() {
        let dispatcher = MessageDispatcher::new(Arc::new(LoggingHandler));
        let (conn, _rx) = handle();
        let bogus = RtmpMessage::command(vec![0xFE, 0x00], 0, 0);
        let err = dispatcher.dispatch(&conn, bogus).await.unwrap_err();
        assert!(matches!(err, Error::UnknownMarker(0xFE)));
    }

    #[tokio::test]
    async fn test_handle_send_reaches_writer() {
        let (conn, mut rx) = handle();
        conn.send_command(&RtmpCommand::on_status("status", "NetStream.Play.Start", ""), 1)
            .await
            .unwrap();
        let msg = rx.recv().await.unwrap();
        assert!(msg.is_command());
        assert_eq!(msg.message_stream_id(), 1);

        drop(rx);
        assert!(matches!(
            conn.send(RtmpMessage::audio(vec![], 0, 1)).await,
            Err(Error::Connection(_))
        ));
    }
}
