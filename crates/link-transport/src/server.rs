//! `LinkServer`: the HTTP/2 (h2c) side of the link — routing, per-link
//! recover discipline, and the name → channel map.
//!
//! `axum::serve` is backed by `hyper-util`'s auto connection builder,
//! which already negotiates h2c cleartext by preface detection, so no
//! separate TLS or ALPN setup is needed for the server half (grounded on
//! the teacher's `services/server/src/main.rs` use of plain
//! `axum::serve`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use link_core::channel::{ChannelConfig, ChannelError};
use link_core::watermark::WatermarkError;
use link_core::Channel;
use link_wire::{Msg, CONSUMER_SEQ_HEADER, ID_HEADER, POST_ROUTE, SYNC_ROUTE};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::client::HttpTransport;

#[derive(Debug, Clone)]
pub struct LinkServerConfig {
    /// Local identity echoed in the `id` header of outbound requests.
    pub id: String,
    /// Peer identity echoed in the `target` header.
    pub target: String,
    /// Local HTTP/2 bind address, e.g. `0.0.0.0:9000`.
    pub host: String,
    /// Peer base URL, e.g. `http://127.0.0.1:9001`.
    pub remote: String,
    /// Marker + per-channel watermark directory. `None` disables
    /// persistence for every channel this server creates.
    pub store_path: Option<PathBuf>,
    /// W for every channel this server creates.
    pub window_size: usize,
    /// If false, recover mode is never entered even if a marker is found.
    pub recover_support: bool,
    /// Constant retry interval for every channel this server creates.
    /// Defaults to the source's 5 seconds via [`Default`].
    pub retry_interval: Duration,
}

impl Default for LinkServerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            target: String::new(),
            host: "0.0.0.0:9000".to_owned(),
            remote: String::new(),
            store_path: None,
            window_size: 8,
            recover_support: false,
            retry_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkServerError {
    #[error("binding {host}: {source}")]
    Bind {
        host: String,
        source: std::io::Error,
    },
    #[error("creating store_path {path}: {source}")]
    StorePath {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("building HTTP/2 client: {0}")]
    ClientBuild(#[from] reqwest::Error),
    #[error(transparent)]
    Watermark(#[from] WatermarkError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

struct Inner {
    config: LinkServerConfig,
    transport: Arc<HttpTransport>,
    channels: RwLock<HashMap<String, Arc<Channel<HttpTransport>>>>,
    recover: bool,
    shutdown_tx: watch::Sender<bool>,
}

/// HTTP/2 server + client pair, URL routing, and channel lifecycle for
/// one link endpoint.
pub struct LinkServer {
    inner: Arc<Inner>,
}

impl LinkServer {
    /// Applies recover discipline (marker file check/create under
    /// `store_path`), builds the H2 client, and prepares the (empty)
    /// channel map. No channels exist until [`LinkServer::new_channel`]
    /// is called.
    pub fn bind(config: LinkServerConfig) -> Result<Arc<Self>, LinkServerError> {
        let recover = match &config.store_path {
            Some(path) => {
                std::fs::create_dir_all(path).map_err(|source| LinkServerError::StorePath {
                    path: path.clone(),
                    source,
                })?;
                let was_recover = config.recover_support && link_core::watermark::is_recover(path);
                link_core::watermark::run_once(path)?;
                was_recover
            }
            None => false,
        };
        info!(recover, host = %config.host, "link server starting");

        let transport = Arc::new(HttpTransport::new(
            config.remote.clone(),
            config.id.clone(),
            config.target.clone(),
        )?);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Arc::new(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                channels: RwLock::new(HashMap::new()),
                recover,
                shutdown_tx,
            }),
        }))
    }

    /// Creates and registers a named channel, launching its workers bound
    /// to this link's cancellation scope.
    pub async fn new_channel(
        self: &Arc<Self>,
        name: impl Into<String>,
    ) -> Result<Arc<Channel<HttpTransport>>, LinkServerError> {
        let name = name.into();
        let channel_config = ChannelConfig {
            name: name.clone(),
            window_size: self.inner.config.window_size,
            store_path: self.inner.config.store_path.clone(),
            recover: self.inner.recover,
            checkpoint_interval: Duration::from_secs(1),
            retry_interval: self.inner.config.retry_interval,
        };
        let channel = Channel::new(
            channel_config,
            self.inner.transport.clone(),
            self.inner.shutdown_tx.subscribe(),
        )?;
        self.inner.channels.write().await.insert(name, channel.clone());
        Ok(channel)
    }

    /// Looks up a previously-created channel by name.
    pub async fn channel(&self, name: &str) -> Option<Arc<Channel<HttpTransport>>> {
        self.inner.channels.read().await.get(name).cloned()
    }

    /// True if this server started in recover mode (the marker file was
    /// already present under `store_path`).
    #[must_use]
    pub fn is_recovering(&self) -> bool {
        self.inner.recover
    }

    fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route(POST_ROUTE, post(handle_post))
            .route(SYNC_ROUTE, post(handle_sync))
            .with_state(self.clone())
    }

    /// Binds the configured host address and serves until
    /// [`LinkServer::shutdown`] is called.
    pub async fn serve(self: Arc<Self>) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.inner.config.host)
            .await
            .map_err(|source| {
                std::io::Error::new(
                    source.kind(),
                    LinkServerError::Bind {
                        host: self.inner.config.host.clone(),
                        source,
                    },
                )
            })?;
        let router = self.router();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|done| *done).await;
            })
            .await
    }

    /// Signals every channel task and the serving loop to tear down.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
    }
}

async fn handle_post(
    State(server): State<Arc<LinkServer>>,
    Path(channel_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(channel) = server.channel(&channel_name).await else {
        return (StatusCode::NOT_FOUND, "channel not find").into_response();
    };
    if headers.get(ID_HEADER).is_none() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "missing id header").into_response();
    }
    let Some(seq) = headers
        .get(CONSUMER_SEQ_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
    else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("missing or malformed {CONSUMER_SEQ_HEADER} header"),
        )
            .into_response();
    };

    if channel.is_stale_inbound(seq) {
        debug!(channel = %channel_name, seq, "duplicate POST absorbed");
        return StatusCode::OK.into_response();
    }

    channel.push_inbound(Msg::new(seq, body.to_vec()));
    StatusCode::OK.into_response()
}

async fn handle_sync(
    State(server): State<Arc<LinkServer>>,
    Path(channel_name): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(channel) = server.channel(&channel_name).await else {
        return (StatusCode::NOT_FOUND, "channel not find").into_response();
    };
    if headers.get(ID_HEADER).is_none() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "missing id header").into_response();
    }
    channel.raise_init();
    info!(channel = %channel_name, "init handshake received");
    StatusCode::OK.into_response()
}
