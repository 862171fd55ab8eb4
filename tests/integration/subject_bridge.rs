//! A `Subject` on one peer forwards external messages across a real
//! HTTP/2 link to the paired peer's external producer, and the
//! originating side's ack callback fires once delivery completes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use link_bridge::{BridgeError, ConsumedMessage, Consumer, Producer, Subject};
use link_transport::{LinkServer, LinkServerConfig};
use tokio::sync::Mutex;

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
        window_size: 4,
        recover_support: false,
        retry_interval: std::time::Duration::from_millis(20),
    }
}

struct QueueConsumer {
    items: Mutex<VecDeque<Vec<u8>>>,
    acked: Arc<AtomicUsize>,
}

impl Consumer for QueueConsumer {
    async fn recv(&self) -> Option<ConsumedMessage> {
        let data = self.items.lock().await.pop_front()?;
        let acked = self.acked.clone();
        Some(ConsumedMessage {
            data,
            ack: Box::new(move || {
                acked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        })
    }
}

struct NeverConsumer;
impl Consumer for NeverConsumer {
    async fn recv(&self) -> Option<ConsumedMessage> {
        None
    }
}

struct CollectingProducer {
    published: Mutex<Vec<Vec<u8>>>,
}
impl Producer for CollectingProducer {
    async fn publish(&self, data: Vec<u8>) -> Result<(), BridgeError> {
        self.published.lock().await.push(data);
        Ok(())
    }
}

struct NullProducer;
impl Producer for NullProducer {
    async fn publish(&self, _data: Vec<u8>) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[tokio::test]
async fn published_messages_cross_the_link_and_ack_on_delivery() {
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

    let acked = Arc::new(AtomicUsize::new(0));
    let consumer_a = Arc::new(QueueConsumer {
        items: Mutex::new(VecDeque::from([
            b"first".to_vec(),
            b"second".to_vec(),
            b"third".to_vec(),
        ])),
        acked: acked.clone(),
    });
    Subject::new(channel_a).run(consumer_a, Arc::new(NullProducer));

    let producer_b = Arc::new(CollectingProducer {
        published: Mutex::new(Vec::new()),
    });
    Subject::new(channel_b).run(Arc::new(NeverConsumer), producer_b.clone());

    tokio::time::timeout(Duration::from_secs(2), async {
        while producer_b.published.lock().await.len() < 3 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("all three messages should have crossed the link");

    assert_eq!(
        *producer_b.published.lock().await,
        vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
    );

    tokio::time::timeout(Duration::from_secs(2), async {
        while acked.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("all three sends should have been acked");

    server_a.shutdown();
    server_b.shutdown();
}
