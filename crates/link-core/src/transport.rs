//! The contract a channel needs from the HTTP/2 link between peers.
//!
//! `link-core` never speaks HTTP itself — `link-transport`'s client
//! implements this trait over a real H2 connection, and
//! `link-test-support` provides a fault-injecting double for tests. Kept as
//! a plain (non-dyn) trait with `async fn`: every channel in a link shares
//! one concrete transport, so generic dispatch is enough and avoids an
//! extra boxing layer.

use std::future::Future;

/// A transport-level failure: connection refused, non-2xx status, or any
/// other condition the sender's retry loop should keep retrying on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {channel} failed: {message}")]
    Request { channel: String, message: String },
    #[error("peer responded to {channel} with status {status}")]
    Status { channel: String, status: u16 },
}

/// Posts messages and sync handshakes to the paired peer.
pub trait Transport: Send + Sync + 'static {
    /// `POST /link/post/{channel}` with the given sequence and body.
    fn post_message(
        &self,
        channel: &str,
        seq: u64,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// `POST /sync/{channel}` to trigger the peer's init handshake.
    fn post_sync(&self, channel: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}
