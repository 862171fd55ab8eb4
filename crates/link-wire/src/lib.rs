//! Wire-level types and route shapes shared by both peers of a link.
//!
//! Everything here is transport-agnostic: header names, route paths, and the
//! `Msg` payload type carried on every `/link/post` request. The actual
//! HTTP/2 server and client, including header parsing and error-to-status
//! mapping, live in `link-transport`.

/// Header carrying the sender's local identity.
pub const ID_HEADER: &str = "id";
/// Header carrying the sender's intended peer identity.
pub const TARGET_HEADER: &str = "target";
/// Header carrying the decimal sequence number of a posted message.
pub const CONSUMER_SEQ_HEADER: &str = "consumer-seq";

/// Builds the push route path for a named channel: `/link/post/{channel}`.
#[must_use]
pub fn post_path(channel: &str) -> String {
    format!("/link/post/{channel}")
}

/// Builds the init-handshake route path for a named channel: `/sync/{channel}`.
#[must_use]
pub fn sync_path(channel: &str) -> String {
    format!("/sync/{channel}")
}

/// Axum route pattern for the push handler (axum 0.8's `{param}` capture
/// syntax, not the pre-0.8 `:param` form).
pub const POST_ROUTE: &str = "/link/post/{channel}";
/// Axum route pattern for the sync handler.
pub const SYNC_ROUTE: &str = "/sync/{channel}";

/// An opaque message: a byte payload plus its per-channel sequence number.
///
/// Mirrors the source's `Msg{Data []byte, Seq uint64}`; sequence is
/// per-channel and per-direction, never shared across channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    pub data: Vec<u8>,
    pub seq: u64,
}

impl Msg {
    #[must_use]
    pub fn new(seq: u64, data: Vec<u8>) -> Self {
        Self { data, seq }
    }
}
