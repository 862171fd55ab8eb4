//! A POST replayed with the same sequence (simulating a sender that
//! retried after its ack was lost in flight) is absorbed by the receiver
//! without a second delivery.

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
async fn replayed_seq_is_not_delivered_twice() {
    let port_b = free_port();
    let server_b = LinkServer::bind(LinkServerConfig {
        id: "b".into(),
        target: "a".into(),
        host: format!("127.0.0.1:{port_b}"),
        remote: "http://127.0.0.1:1".into(),
        store_path: None,
        window_size: 1,
        recover_support: false,
        retry_interval: std::time::Duration::from_millis(20),
    })
    .unwrap();

    tokio::spawn(server_b.clone().serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let channel_b = server_b.new_channel("orders").await.unwrap();
    let client = reqwest::Client::builder()
        .http2_prior_knowledge()
        .build()
        .unwrap();
    let base = format!("http://127.0.0.1:{port_b}");

    post(&client, &base, "orders", 0, b"first").await;
    post(&client, &base, "orders", 0, b"first").await; // replay of the same seq
    post(&client, &base, "orders", 1, b"second").await;

    assert_eq!(channel_b.recv().await.unwrap(), b"first");
    assert_eq!(channel_b.recv().await.unwrap(), b"second");

    server_b.shutdown();
}
