// Integration tests for the RTMP engine over real TCP sockets

mod common;

use common::{eventually, start_server, test_config, TestClient, TestHandler};
use rtmp::{
    client_handshake, Amf0Value, ChunkReader, ChunkWriter, Collector, ConnectionSource,
    ConnectionState, ErrorCategory, HandshakeOptions, MetricsExporter, RtmpCommand,
    RtmpConnCollector, RtmpMessage, ServerConfig, DEFAULT_WINDOW_SIZE,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_connect_gets_result() {
    let handler = Arc::new(TestHandler::default());
    let (server, addr, task) = start_server(test_config(), handler.clone()).await;

    let mut client = TestClient::connect(addr).await.expect("handshake");
    client
        .send_command(&RtmpCommand::connect("live", &format!("rtmp://{}/live", addr)), 0)
        .await
        .unwrap();

    let reply = client.recv_command().await.unwrap();
    assert_eq!(reply.name, "_result");
    assert_eq!(reply.transaction_id, 1.0);
    let info = &reply.arguments[1];
    assert_eq!(
        info.get_property("code").and_then(Amf0Value::as_str),
        Some("NetConnection.Connect.Success")
    );
    assert_eq!(*handler.commands.lock().unwrap(), vec!["connect"]);
    assert_eq!(client.window_ack_size, Some(DEFAULT_WINDOW_SIZE));

    server.shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_announces_larger_chunk_size() {
    let config = ServerConfig::builder()
        .host("127.0.0.1")
        .chunk_size(4096)
        .build()
        .unwrap();
    let (server, addr, _task) = start_server(config, Arc::new(TestHandler::default())).await;

    let mut client = TestClient::connect(addr).await.unwrap();
    client
        .send_command(&RtmpCommand::connect("live", "rtmp://localhost/live"), 0)
        .await
        .unwrap();

    let reply = client.recv_command().await.unwrap();
    assert_eq!(reply.name, "_result");
    // The SetChunkSize ahead of the reply was applied by the client
    assert_eq!(client.reader.chunk_size(), 4096);

    server.shutdown();
}

#[tokio::test]
async fn test_large_media_is_reassembled() {
    let handler = Arc::new(TestHandler::default());
    let (server, addr, _task) = start_server(test_config(), handler.clone()).await;

    let mut client = TestClient::connect(addr).await.unwrap();
    let video: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    client.send(&RtmpMessage::video(video, 40, 1)).await.unwrap();
    client.send(&RtmpMessage::audio(vec![0xAF, 0x01, 0x21], 40, 1)).await.unwrap();

    // The connect reply proves everything before it was dispatched
    client
        .send_command(&RtmpCommand::connect("live", "rtmp://localhost/live"), 0)
        .await
        .unwrap();
    client.recv_command().await.unwrap();

    assert_eq!(*handler.media_sizes.lock().unwrap(), vec![10_000, 3]);
    server.shutdown();
}

#[tokio::test]
async fn test_registry_feeds_connection_metrics() {
    let handler = Arc::new(TestHandler::default());
    let (server, addr, _task) = start_server(test_config(), handler).await;

    let mut client = TestClient::connect(addr).await.unwrap();
    client
        .send_command(&RtmpCommand::new("publish", 5.0).with_argument(Amf0Value::Null), 1)
        .await
        .unwrap();
    let status = client.recv_command().await.unwrap();
    assert_eq!(status.name, "onStatus");

    let registry = server.registry();
    let summary = registry.list_connections().unwrap().into_iter().next().expect("one connection");
    assert_eq!(summary.state, ConnectionState::Publishing);
    assert!(summary.chunk_streams >= 1);

    let collector = RtmpConnCollector::new(registry.clone());
    assert_eq!(collector.collect().len(), 1);

    let mut exporter = MetricsExporter::new();
    exporter.register(Box::new(collector));
    let text = exporter.render_text().unwrap();
    assert!(text.contains(r#"rtmp_conns{state="publish"} 1"#), "{}", text);

    drop(client);
    assert!(eventually(|| server.connection_count() == 0).await);
    assert!(exporter.gather().is_empty());
    server.shutdown();
}

#[tokio::test]
async fn test_metrics_endpoint_serves_connection_counts() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (server, addr, _task) = start_server(test_config(), Arc::new(TestHandler::default())).await;
    let mut client = TestClient::connect(addr).await.unwrap();
    client
        .send_command(&RtmpCommand::new("publish", 5.0).with_argument(Amf0Value::Null), 1)
        .await
        .unwrap();
    client.recv_command().await.unwrap();

    let mut exporter = MetricsExporter::new();
    exporter.register(Box::new(RtmpConnCollector::new(server.registry())));
    let metrics = exporter.listen("127.0.0.1:0").await.unwrap();

    let mut http = tokio::net::TcpStream::connect(metrics.local_addr()).await.unwrap();
    http.write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    http.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.contains("text/plain; version=0.0.4"));
    assert!(response.contains(r#"rtmp_conns{state="publish"} 1"#), "{}", response);

    let local = metrics.local_addr();
    tokio::time::timeout(Duration::from_secs(2), metrics.close())
        .await
        .expect("metrics server stops")
        .unwrap();
    assert!(tokio::net::TcpStream::connect(local).await.is_err());
    server.shutdown();
}

#[tokio::test]
async fn test_server_respects_connection_limit() {
    let config = ServerConfig::builder()
        .host("127.0.0.1")
        .max_connections(1)
        .build()
        .expect("Failed to build config");
    let (server, addr, _task) = start_server(config, Arc::new(TestHandler::default())).await;

    let _first = TestClient::connect(addr).await.expect("first client fits");
    assert!(eventually(|| server.connection_count() == 1).await);

    // The second socket is accepted and dropped before any handshake byte
    assert!(TestClient::connect(addr).await.is_err());
    assert_eq!(server.connection_count(), 1);
    server.shutdown();
}

#[tokio::test]
async fn test_too_many_chunk_streams_closes_connection() {
    let (server, addr, _task) = start_server(test_config(), Arc::new(TestHandler::default())).await;
    let mut client = TestClient::connect(addr).await.unwrap();

    // Sixteen chunk streams are allowed, the seventeenth is not
    for csid in 3..20 {
        let message = RtmpMessage::new(csid, 8, 1, 0, vec![0xAF, 0x01]);
        client.send(&message).await.unwrap();
    }

    let err = client.recv().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io, "{}", err);
    assert!(eventually(|| server.connection_count() == 0).await);
    server.shutdown();
}

#[tokio::test]
async fn test_shutdown_closes_live_connections() {
    let (server, addr, task) = start_server(test_config(), Arc::new(TestHandler::default())).await;
    let mut client = TestClient::connect(addr).await.unwrap();
    assert!(eventually(|| server.connection_count() == 1).await);

    server.shutdown();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("accept loop stops")
        .unwrap()
        .unwrap();

    assert!(client.recv().await.is_err());
    assert!(eventually(|| server.connection_count() == 0).await);
}

#[tokio::test]
async fn test_handshake_over_duplex_and_chunk_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(64 * 1024);

    let server_side = tokio::spawn(async move {
        rtmp::server_handshake(&mut server, HandshakeOptions::default()).await?;
        let mut reader = ChunkReader::new();
        let first = reader.read_message(&mut server).await?;
        let second = reader.read_message(&mut server).await?;
        rtmp::Result::Ok((first, second))
    });

    client_handshake(&mut client, HandshakeOptions::default()).await.unwrap();
    let mut writer = ChunkWriter::new();
    let big = RtmpMessage::new(6, 9, 1, 0x0100_0000, vec![7u8; 300]);
    let small = RtmpMessage::new(6, 9, 1, 0x0100_0021, vec![8u8; 5]);
    writer.write_message(&big, &mut client).await.unwrap();
    writer.write_message(&small, &mut client).await.unwrap();

    let (first, second) = server_side.await.unwrap().unwrap();
    assert_eq!(first, big);
    assert_eq!(second, small);
}

#[tokio::test]
async fn test_server_config_validation() {
    assert!(ServerConfig::builder().port(0).build().is_err(), "Should reject port 0");
    assert!(
        ServerConfig::builder().chunk_size(100).build().is_err(),
        "Should reject chunk size < 128"
    );
    assert!(
        ServerConfig::builder().chunk_size(100000).build().is_err(),
        "Should reject chunk size > 65536"
    );
    assert!(ServerConfig::builder()
        .host("0.0.0.0")
        .port(1935)
        .chunk_size(4096)
        .build()
        .is_ok());
}
