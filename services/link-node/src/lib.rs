//! Wires a [`LinkServer`](link_transport::LinkServer) and its configured
//! channels into a running node: binds, registers every `[[channels]]`
//! entry, completes each channel's init handshake, and serves until
//! signalled to stop.
//!
//! `link-core` and `link-transport` stay free of CLI/TOML concerns; this
//! crate is the only one that knows about [`NodeConfig`].

pub mod config;
mod stub_bridge;

use std::sync::Arc;
use std::time::Duration;

use link_bridge::Subject;
use link_transport::{LinkServer, LinkServerConfig, LinkServerError};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::NodeConfig;
use crate::stub_bridge::{LoggingProducer, NullConsumer};

/// Builds the [`LinkServerConfig`] this node's `LinkServer` is bound with.
#[must_use]
pub fn link_server_config(config: &NodeConfig) -> LinkServerConfig {
    LinkServerConfig {
        id: config.id.clone(),
        target: config.target.clone(),
        host: config.host.clone(),
        remote: format!("http://{}", config.remote),
        store_path: config.store_path.clone(),
        window_size: config.window_size,
        recover_support: config.recover_support,
        retry_interval: Duration::from_secs(5),
    }
}

/// Binds the link server, starts serving its HTTP/2 listener, creates every
/// configured channel, and waits for each one's init handshake to complete
/// before returning.
///
/// The listener is spawned *before* any handshake is awaited: `wait_init`
/// blocks until the peer's `/sync/{name}` POST reaches this node's own
/// handler, which requires this node to already be accepting connections.
/// Awaiting a handshake before `serve()` is running would deadlock forever.
/// Returns the bound server plus the handle of its running `serve()` task,
/// so the caller can await it after calling `server.shutdown()`.
pub async fn start(
    config: &NodeConfig,
) -> Result<(Arc<LinkServer>, JoinHandle<std::io::Result<()>>), LinkServerError> {
    let server = LinkServer::bind(link_server_config(config))?;
    let served = tokio::spawn(server.clone().serve());

    let mut channels = Vec::with_capacity(config.channels.len());
    for entry in &config.channels {
        info!(channel = %entry.name, "creating channel");
        let channel = server.new_channel(entry.name.clone()).await?;

        let consumer = Arc::new(NullConsumer);
        let producer = Arc::new(LoggingProducer {
            channel_name: entry.name.clone(),
        });
        Subject::new(channel.clone()).run(consumer, producer);

        channels.push(channel);
    }

    let handshakes = channels.iter().cloned().map(|channel| {
        tokio::spawn(async move {
            channel.wait_init().await;
            info!(channel = channel.name(), "init handshake complete");
        })
    });
    for handshake in handshakes {
        let _ = handshake.await;
    }

    Ok((server, served))
}
