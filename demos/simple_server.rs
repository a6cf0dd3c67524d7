// Simple RTMP Server Example
//
// Accepts connections, answers the NetConnection/NetStream commands a
// publisher or player sends first, and serves connection metrics at
// http://localhost:9998/metrics.
//
// Usage:
//   cargo run --example simple_server -- [port]

use log::{info, warn};
use rtmp::{
    create_response, Amf0Object, Amf0Value, ConnectionHandle, ConnectionState, ControlMessage,
    Error, MetricsExporter, Result, RtmpCommand, RtmpConnCollector, RtmpMessage, RtmpServer,
    ServerConfig, SessionHandler, DEFAULT_WINDOW_SIZE,
};
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Answers the handful of commands needed to get media flowing
struct DemoHandler {
    next_stream_id: AtomicU32,
}

#[async_trait::async_trait]
impl SessionHandler for DemoHandler {
    async fn on_command(
        &self,
        conn: &ConnectionHandle,
        message: &RtmpMessage,
        command: RtmpCommand,
    ) -> Result<()> {
        match command.name.as_str() {
            "connect" => {
                let app = command
                    .command_object()
                    .and_then(|obj| obj.get_property("app"))
                    .and_then(Amf0Value::as_str)
                    .unwrap_or("");
                info!("[{}] connect to app '{}'", conn.id(), app);

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
                    .with("code", Amf0Value::string("NetConnection.Connect.Success"))
                    .with("description", Amf0Value::string("Connection succeeded."));
                conn.send(create_response(
                    message,
                    Amf0Value::Object(properties),
                    Amf0Value::Object(info),
                )?)
                .await
            }
            "createStream" => {
                let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
                conn.send(create_response(
                    message,
                    Amf0Value::Null,
                    Amf0Value::number(stream_id),
                )?)
                .await
            }
            "publish" => {
                conn.set_state(ConnectionState::Publishing);
                conn.send_command(
                    &RtmpCommand::on_status("status", "NetStream.Publish.Start", "Publishing."),
                    message.message_stream_id(),
                )
                .await
            }
            "play" => {
                conn.set_state(ConnectionState::Reading);
                conn.send_command(
                    &RtmpCommand::on_status("status", "NetStream.Play.Start", "Playing."),
                    message.message_stream_id(),
                )
                .await
            }
            other => {
                info!("[{}] ignoring command {}", conn.id(), other);
                Ok(())
            }
        }
    }

    async fn on_disconnect(&self, conn: &ConnectionHandle, reason: Option<&Error>) {
        match reason {
            Some(e) => warn!("[{}] session ended: {}", conn.id(), e),
            None => info!("[{}] session ended", conn.id()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let port = env::args()
        .nth(1)
        .map(|p| p.parse::<u16>())
        .transpose()
        .map_err(|e| Error::config(format!("Invalid port: {}", e)))?
        .unwrap_or(1935);

    let config = ServerConfig::builder()
        .port(port)
        .chunk_size(4096)
        .build()?;

    let handler = Arc::new(DemoHandler {
        next_stream_id: AtomicU32::new(1),
    });
    let server = Arc::new(RtmpServer::with_handler(config, handler));

    let mut exporter = MetricsExporter::new();
    exporter.register(Box::new(RtmpConnCollector::new(server.registry())));
    let metrics = exporter.listen("0.0.0.0:9998").await?;
    info!("metrics available at http://{}/metrics", metrics.local_addr());

    {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received");
                server.shutdown();
            }
        });
    }

    let result = server.listen().await;
    metrics.close().await?;
    result
}
