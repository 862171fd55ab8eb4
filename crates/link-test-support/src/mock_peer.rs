//! A mock peer for integration tests: binds to a random port, records
//! every `/link/post` it receives, and can be told to fail the next N
//! POSTs for a given sequence before accepting — used to exercise the
//! sender's retry loop without a real flaky network.
//!
//! Mirrors `rt-test-utils`'s `MockWsServer`: binds port 0, exposes the
//! actual bound address, and runs its accept loop in a background task.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use link_wire::{CONSUMER_SEQ_HEADER, POST_ROUTE, SYNC_ROUTE};
use tokio::sync::{mpsc, Mutex};

/// A POST recorded by the mock peer.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub channel: String,
    pub seq: u64,
    pub body: Vec<u8>,
}

struct AppState {
    posts_tx: mpsc::UnboundedSender<RecordedPost>,
    syncs_tx: mpsc::UnboundedSender<String>,
    fail_next: Mutex<HashMap<(String, u64), u32>>,
}

pub struct MockPeer {
    addr: SocketAddr,
    posts_rx: Mutex<mpsc::UnboundedReceiver<RecordedPost>>,
    syncs_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    state: Arc<AppState>,
    _task: tokio::task::JoinHandle<()>,
}

impl MockPeer {
    pub async fn start() -> Self {
        let (posts_tx, posts_rx) = mpsc::unbounded_channel();
        let (syncs_tx, syncs_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AppState {
            posts_tx,
            syncs_tx,
            fail_next: Mutex::new(HashMap::new()),
        });

        let router = Router::new()
            .route(POST_ROUTE, post(handle_post))
            .route(SYNC_ROUTE, post(handle_sync))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("binding mock peer listener");
        let addr = listener.local_addr().expect("mock peer local_addr");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            addr,
            posts_rx: Mutex::new(posts_rx),
            syncs_rx: Mutex::new(syncs_rx),
            state,
            _task: task,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Makes the next `times` POSTs for `(channel, seq)` fail with a 503
    /// before the mock peer starts accepting it.
    pub async fn fail_next(&self, channel: &str, seq: u64, times: u32) {
        self.state
            .fail_next
            .lock()
            .await
            .insert((channel.to_owned(), seq), times);
    }

    /// Waits for and returns the next recorded POST.
    pub async fn next_post(&self) -> Option<RecordedPost> {
        self.posts_rx.lock().await.recv().await
    }

    /// Waits for and returns the next channel name to receive a sync POST.
    pub async fn next_sync(&self) -> Option<String> {
        self.syncs_rx.lock().await.recv().await
    }
}

async fn handle_post(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(seq) = headers
        .get(CONSUMER_SEQ_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
    else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    {
        let mut fail_next = state.fail_next.lock().await;
        if let Some(remaining) = fail_next.get_mut(&(channel.clone(), seq)) {
            if *remaining > 0 {
                *remaining -= 1;
                return StatusCode::SERVICE_UNAVAILABLE;
            }
        }
    }

    let _ = state.posts_tx.send(RecordedPost {
        channel,
        seq,
        body: body.to_vec(),
    });
    StatusCode::OK
}

async fn handle_sync(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> impl IntoResponse {
    let _ = state.syncs_tx.send(channel);
    StatusCode::OK
}
