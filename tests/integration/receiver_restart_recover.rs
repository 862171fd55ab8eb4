//! A channel that persists its watermark resumes from the last flushed
//! cursor after a restart, instead of re-delivering already-consumed
//! sequences.

use std::time::Duration;

use link_transport::{LinkServer, LinkServerConfig};
use link_wire::{CONSUMER_SEQ_HEADER, ID_HEADER, TARGET_HEADER};

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn config(host_port: u16, store_path: std::path::PathBuf) -> LinkServerConfig {
    LinkServerConfig {
        id: "b".into(),
        target: "a".into(),
        host: format!("127.0.0.1:{host_port}"),
        remote: "http://127.0.0.1:1".into(),
        store_path: Some(store_path),
        window_size: 1,
        recover_support: true,
        retry_interval: std::time::Duration::from_millis(20),
    }
}

async fn post(client: &reqwest::Client, base: &str, channel: &str, seq: u64, body: &[u8]) {
    let response = client
        .post(format!("{base}/link/post/{channel}"))
        .header(ID_HEADER, "tester")
        .header(TARGET_HEADER, "b")
        .header(CONSUMER_SEQ_HEADER, seq.to_string())
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn restart_resumes_from_the_last_flushed_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let client = reqwest::Client::builder()
        .http2_prior_knowledge()
        .build()
        .unwrap();

    let port1 = free_port();
    let server1 = LinkServer::bind(config(port1, dir.path().to_path_buf())).unwrap();
    assert!(!server1.is_recovering());
    tokio::spawn(server1.clone().serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let channel1 = server1.new_channel("orders").await.unwrap();
    let base1 = format!("http://127.0.0.1:{port1}");
    for seq in 0..5u64 {
        post(&client, &base1, "orders", seq, seq.to_string().as_bytes()).await;
    }
    for seq in 0..5u64 {
        assert_eq!(channel1.recv().await.unwrap(), seq.to_string().into_bytes());
    }

    // Let the checkpoint ticker flush the cursor, then tear this
    // instance down entirely.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    server1.shutdown();

    let port2 = free_port();
    let server2 = LinkServer::bind(config(port2, dir.path().to_path_buf())).unwrap();
    assert!(server2.is_recovering());
    tokio::spawn(server2.clone().serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let channel2 = server2.new_channel("orders").await.unwrap();
    let base2 = format!("http://127.0.0.1:{port2}");

    // Replays of the already-consumed range are silently absorbed.
    for seq in 0..5u64 {
        post(&client, &base2, "orders", seq, b"stale").await;
    }
    post(&client, &base2, "orders", 5, b"fresh").await;

    assert_eq!(channel2.recv().await.unwrap(), b"fresh");

    server2.shutdown();
}
