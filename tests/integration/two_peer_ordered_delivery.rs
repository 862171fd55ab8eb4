//! Two independent `LinkServer` processes, talking real HTTP/2 cleartext
//! over loopback, exchange an init handshake and then deliver a run of
//! sends strictly in order on the receiving side.

use std::time::Duration;

use link_transport::{LinkServer, LinkServerConfig};

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
async fn sends_from_a_arrive_at_b_in_order() {
    let port_a = free_port();
    let port_b = free_port();

    let server_a = LinkServer::bind(config("a", "b", port_a, port_b)).unwrap();
    let server_b = LinkServer::bind(config("b", "a", port_b, port_a)).unwrap();

    tokio::spawn(server_a.clone().serve());
    tokio::spawn(server_b.clone().serve());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let channel_a = server_a.new_channel("orders").await.unwrap();
    let channel_b = server_b.new_channel("orders").await.unwrap();

    tokio::join!(channel_a.wait_init(), channel_b.wait_init());

    let sender = channel_a.sender();
    for i in 0..10u64 {
        sender
            .send(link_wire::Msg::new(i, i.to_string().into_bytes()))
            .await
            .unwrap();
    }

    for i in 0..10u64 {
        assert_eq!(channel_a.recv_ack().await, Some(i));
    }

    for i in 0..10u64 {
        let received = channel_b.recv().await.unwrap();
        assert_eq!(received, i.to_string().into_bytes());
    }

    server_a.shutdown();
    server_b.shutdown();
}
