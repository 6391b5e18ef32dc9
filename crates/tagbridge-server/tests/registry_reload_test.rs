//! Registry edits while the bridge runs
//!
//! The production server is bound with a registry path that does not exist
//! yet; the admin tool writes it afterwards and the next reader connection
//! must be accepted.

use std::time::Duration;

use hex_literal::hex;
use tagbridge_server::{Server, ServerRuntimeConfig};
use tokio::{io::AsyncWriteExt, net::TcpStream};
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

const TAG: [u8; 12] = hex!("CCFF0011 A1B2C3D4E5F6 9A3B");

#[tokio::test]
async fn reader_registered_after_bind_is_accepted() {
    let inventory = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/rfid-update"))
        .and(body_json(serde_json::json!({
            "readerIp": "127.0.0.1",
            "epc": "A1B2C3D4E5F6",
            "type": "shelf",
            "detected": true,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&inventory)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("rfid_config.json");

    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        registry_path: registry_path.clone(),
        endpoint: format!("{}/api/rfid-update", inventory.uri()),
        ..ServerRuntimeConfig::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(server.run(shutdown.clone()));

    std::fs::write(&registry_path, r#"{"shelves":[{"name":"Fiction-A","ip":"127.0.0.1"}]}"#)
        .unwrap();

    let mut reader = TcpStream::connect(addr).await.unwrap();
    reader.write_all(&TAG).await.unwrap();

    let forwarded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if !inventory.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(forwarded.is_ok(), "appearance was not forwarded");

    drop(reader);
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

#[tokio::test]
async fn reader_removed_from_registry_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("rfid_config.json");
    std::fs::write(&registry_path, r#"{"shelves":[{"name":"Fiction-A","ip":"127.0.0.1"}]}"#)
        .unwrap();

    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        registry_path: registry_path.clone(),
        // Never reached: the reader is rejected before any frame is decoded.
        endpoint: "http://127.0.0.1:9/api/rfid-update".to_string(),
        ..ServerRuntimeConfig::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(server.run(shutdown.clone()));

    std::fs::write(&registry_path, r#"{"shelves":[]}"#).unwrap();

    let mut reader = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::io::AsyncReadExt::read(&mut reader, &mut buf),
    )
    .await
    .expect("connection was not closed");
    assert!(matches!(read, Ok(0) | Err(_)), "expected EOF, got {read:?}");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}
