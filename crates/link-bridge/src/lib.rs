//! Subject bridge: pairs an external message-queue consumer/producer to a
//! channel, rewriting sequences to the clean 0-based stream the channel
//! requires and forwarding acks back to the external consumer.
//!
//! Grounded on `serve.go`'s `slink()`: one fiber reassigns inbound
//! external messages a channel-scoped sequence and remembers their ack
//! callback keyed by that sequence; a second fiber drains the channel's
//! ack queue and invokes the matching callback. `mq/mq.go`'s
//! `Consumer`/`Producer` interfaces are the external collaborator this
//! module only defines the contract for — no real backend (NATS, or any
//! other durable queue) is implemented here; that integration is outside
//! this crate's scope.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use link_core::{Channel, Transport};
use link_wire::Msg;
use tokio::sync::Mutex;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("external ack failed: {0}")]
    Ack(String),
    #[error("external publish failed: {0}")]
    Publish(String),
}

/// Invoked once the channel has ack'd the corresponding message.
pub type AckFn = Box<dyn FnOnce() -> Result<(), BridgeError> + Send>;

/// One message read from the external consumer, paired with the callback
/// that acknowledges it once the channel has delivered it to the peer.
pub struct ConsumedMessage {
    pub data: Vec<u8>,
    pub ack: AckFn,
}

/// The external queue's read side. A real implementation (e.g. a durable
/// JetStream-backed consumer) lives outside this crate.
pub trait Consumer: Send + Sync + 'static {
    fn recv(&self) -> impl Future<Output = Option<ConsumedMessage>> + Send;
}

/// The external queue's write side.
pub trait Producer: Send + Sync + 'static {
    fn publish(&self, data: Vec<u8>) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

/// Pairs one named channel with one external consumer/producer pair.
pub struct Subject<T: Transport> {
    channel: Arc<Channel<T>>,
}

impl<T: Transport> Subject<T> {
    #[must_use]
    pub fn new(channel: Arc<Channel<T>>) -> Self {
        Self { channel }
    }

    /// Spawns the consume-side and publish-side fibers. Returns once both
    /// have been launched; they run until their external source is
    /// exhausted or the channel's queues close.
    pub fn run<C, P>(&self, consumer: Arc<C>, producer: Arc<P>)
    where
        C: Consumer,
        P: Producer,
    {
        let pending_acks: Arc<Mutex<HashMap<u64, AckFn>>> = Arc::new(Mutex::new(HashMap::new()));
        let next_seq = Arc::new(AtomicU64::new(0));

        tokio::spawn(consume_loop(
            consumer,
            self.channel.sender(),
            pending_acks.clone(),
            next_seq,
        ));
        tokio::spawn(ack_loop(self.channel.clone(), pending_acks));
        tokio::spawn(publish_loop(self.channel.clone(), producer));
    }
}

async fn consume_loop<C: Consumer>(
    consumer: Arc<C>,
    sender: tokio::sync::mpsc::Sender<Msg>,
    pending_acks: Arc<Mutex<HashMap<u64, AckFn>>>,
    next_seq: Arc<AtomicU64>,
) {
    loop {
        let Some(message) = consumer.recv().await else {
            return;
        };
        let seq = next_seq.fetch_add(1, Ordering::SeqCst);
        pending_acks.lock().await.insert(seq, message.ack);
        if sender.send(Msg::new(seq, message.data)).await.is_err() {
            return;
        }
    }
}

async fn ack_loop<T: Transport>(
    channel: Arc<Channel<T>>,
    pending_acks: Arc<Mutex<HashMap<u64, AckFn>>>,
) {
    loop {
        let Some(seq) = channel.recv_ack().await else {
            return;
        };
        let ack_fn = pending_acks.lock().await.remove(&seq);
        if let Some(ack_fn) = ack_fn {
            if let Err(error) = ack_fn() {
                error!(seq, %error, "external ack failed");
            }
        } else {
            warn!(seq, "ack for unknown channel sequence");
        }
    }
}

async fn publish_loop<T: Transport, P: Producer>(channel: Arc<Channel<T>>, producer: Arc<P>) {
    loop {
        let Some(data) = channel.recv().await else {
            return;
        };
        if let Err(error) = producer.publish(data).await {
            error!(%error, "external publish failed");
        }
    }
}
