//! The init handshake completes in both directions, and a peer that
//! retries its `/sync` POST after the handshake already landed does not
//! panic the receiving side's latch.

use std::time::Duration;

use link_transport::{LinkServer, LinkServerConfig};
use link_wire::ID_HEADER;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn config(id: &str, target: &str, host_port: u16, remote_port: u16) -> LinkServerConfig {
    LinkServerConfig {
        id: id.to_owned(),
        target: target.to_owned(),
        host: format!("127.0.0.1:{host_port}"),
        remote: format!("http://127.0.0.1:{remote_port}"),
        store_path: None,
        window_size: 1,
        recover_support: false,
        retry_interval: std::time::Duration::from_millis(20),
    }
}

#[tokio::test]
async fn handshake_completes_in_both_directions() {
    let port_a = free_port();
    let port_b = free_port();

    let server_a = LinkServer::bind(config("a", "b", port_a, port_b)).unwrap();
    let server_b = LinkServer::bind(config("b", "a", port_b, port_a)).unwrap();
    tokio::spawn(server_a.clone().serve());
    tokio::spawn(server_b.clone().serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let channel_a = server_a.new_channel("orders").await.unwrap();
    let channel_b = server_b.new_channel("orders").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(channel_a.wait_init(), channel_b.wait_init());
    })
    .await
    .expect("handshake should complete quickly over loopback");

    server_a.shutdown();
    server_b.shutdown();
}

#[tokio::test]
async fn a_replayed_sync_post_does_not_panic_the_receiver() {
    let port_b = free_port();
    let server_b = LinkServer::bind(config("b", "a", port_b, 1)).unwrap();
    tokio::spawn(server_b.clone().serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let channel_b = server_b.new_channel("orders").await.unwrap();
    let client = reqwest::Client::builder()
        .http2_prior_knowledge()
        .build()
        .unwrap();
    let base = format!("http://127.0.0.1:{port_b}");

    for _ in 0..3 {
        let response = client
            .post(format!("{base}/sync/orders"))
            .header(ID_HEADER, "a")
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    channel_b.wait_init().await; // would hang (or the latch would have
                                 // panicked during setup) if the repeat
                                 // sync posts were not idempotent
    server_b.shutdown();
}
