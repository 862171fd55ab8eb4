//! A placeholder [`Consumer`]/[`Producer`] pair wired into every configured
//! channel so `link_bridge::Subject` runs as part of a real process, even
//! though no external queue backend is configured here. Swapping in a real
//! backend (e.g. a durable JetStream consumer/producer) only requires
//! implementing these two traits elsewhere and passing them to
//! [`link_bridge::Subject::run`] instead.

use std::future::{pending, Future};

use link_bridge::{BridgeError, Consumer, ConsumedMessage, Producer};
use tracing::debug;

/// Never yields a message. A channel paired with this consumer only ever
/// carries traffic the peer sends to it; nothing is published from this
/// side until a real external source is wired in.
pub struct NullConsumer;

impl Consumer for NullConsumer {
    fn recv(&self) -> impl Future<Output = Option<ConsumedMessage>> + Send {
        pending()
    }
}

/// Logs every message the channel delivers instead of forwarding it
/// anywhere. Lets a node run end-to-end (including acking the peer) before
/// a real external producer exists.
pub struct LoggingProducer {
    pub channel_name: String,
}

impl Producer for LoggingProducer {
    async fn publish(&self, data: Vec<u8>) -> Result<(), BridgeError> {
        debug!(channel = %self.channel_name, bytes = data.len(), "stub producer received message");
        Ok(())
    }
}
