//! HTTP/2 transport for the link: the `LinkServer` (routing, recover
//! discipline, channel lifecycle) and the `HttpTransport` client channels
//! use to POST to the peer.

pub mod client;
pub mod server;

pub use client::HttpTransport;
pub use server::{LinkServer, LinkServerConfig, LinkServerError};
