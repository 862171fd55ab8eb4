//! The Channel engine: windowed concurrent sender, in-order receiver
//! reassembly, and the one-shot init handshake latch.
//!
//! Grounded on `link/h2/stream.go`'s `channel`/`newChannel`/`send_loop`/
//! `recv_loop`/`WaitInit`, with the two Design-Notes fixes applied: a
//! duplicate completion `continue`s the worker loop instead of returning
//! from it, and the `MinHeap::remove` it relies on early-returns after its
//! first match.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use link_wire::Msg;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, Notify};
use tracing::{debug, warn};

use crate::heap::MinHeap;
use crate::recv_buffer::ReceiverBuffer;
use crate::retry::{retry_on_error, Backoff};
use crate::transport::{Transport, TransportError};
use crate::watermark::{self, WatermarkError};

/// Configuration needed to construct one named channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub name: String,
    /// W: bounds in-flight sends, fan-out depth, and all bounded queues.
    pub window_size: usize,
    /// Directory the watermark ticker writes `<name>` into. `None`
    /// disables checkpointing entirely.
    pub store_path: Option<PathBuf>,
    /// Whether to prime the receive cursor from a previously-flushed
    /// watermark file (only meaningful when `store_path` is set).
    pub recover: bool,
    /// Cadence of the watermark-flush ticker.
    pub checkpoint_interval: Duration,
    /// Constant interval between retries of a failing POST (§9 Design
    /// Notes: "expose an unbounded-retry backoff policy but allow caller
    /// override"). Defaults to the source's 5 seconds; tests use a much
    /// shorter interval.
    pub retry_interval: Duration,
}

impl ChannelConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, window_size: usize) -> Self {
        Self {
            name: name.into(),
            window_size,
            store_path: None,
            recover: false,
            checkpoint_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error(transparent)]
    Watermark(#[from] WatermarkError),
}

/// A read-only in-process snapshot of a channel's progress, used for
/// startup logging and tests rather than a second status HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub send_pending: usize,
    pub send_consumer_seq: u64,
    pub recv_consumer_seq: u64,
}

/// One-shot idempotent latch: raised at most once, observable any number
/// of times, by any number of waiters, before or after the raise.
struct InitLatch {
    raised: std::sync::atomic::AtomicBool,
    notify: Notify,
}

impl InitLatch {
    fn new() -> Self {
        Self {
            raised: std::sync::atomic::AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Idempotent: a second call is a silent no-op rather than a panic,
    /// fixing the source's unguarded `close(c.sync)`.
    fn raise(&self) {
        if self
            .raised
            .compare_exchange(
                false,
                true,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            self.notify.notify_waiters();
        }
    }

    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.raised.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// Retires a freshly-completed send from the in-flight heap, advancing
/// `consumer_seq` when it was the heap's minimum. Only call this from the
/// real-success path, where `seq` is necessarily `>= consumer_seq` — a
/// genuinely in-flight sequence can never be below the cursor.
fn retire_completed(
    send_pending: &std::sync::Mutex<MinHeap<u64>>,
    consumer_seq: &AtomicU64,
    seq: u64,
) {
    let mut heap = send_pending.lock().expect("send_pending mutex poisoned");
    if heap.top() == Some(&seq) {
        heap.pop();
        consumer_seq.store(seq, Ordering::SeqCst);
    } else {
        heap.remove(&seq);
    }
}

/// Retires a duplicate/retried send that the dispatcher re-inserted into
/// the heap. Never advances `consumer_seq`: `seq` is already `<
/// consumer_seq` by definition of "duplicate", so it would otherwise be
/// the heap's new minimum and move the cursor backward.
fn retire_duplicate(send_pending: &std::sync::Mutex<MinHeap<u64>>, seq: u64) {
    send_pending
        .lock()
        .expect("send_pending mutex poisoned")
        .remove(&seq);
}

/// Per-named-channel send/recv/ack engine. Bidirectional: every channel
/// both sends and receives, each direction tracking its own
/// `consumer_seq` independently.
pub struct Channel<T: Transport> {
    name: Arc<str>,
    transport: Arc<T>,
    send_tx: mpsc::Sender<Msg>,
    ack_rx: AsyncMutex<mpsc::Receiver<u64>>,
    recv_rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    recv_buffer: Arc<ReceiverBuffer>,
    send_pending: Arc<std::sync::Mutex<MinHeap<u64>>>,
    send_consumer_seq: Arc<AtomicU64>,
    init: Arc<InitLatch>,
    retry_interval: Duration,
}

impl<T: Transport> Channel<T> {
    /// Constructs the channel and spawns its dispatcher, `window_size`
    /// workers, reassembly loop, and (if enabled) checkpoint ticker.
    pub fn new(
        config: ChannelConfig,
        transport: Arc<T>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Arc<Self>, ChannelError> {
        watermark::validate_channel_name(&config.name)?;
        let window = config.window_size.max(1);

        let start_seq = if config.recover {
            config
                .store_path
                .as_deref()
                .and_then(|path| watermark::read_consumer_seq(path, &config.name).ok().flatten())
                .unwrap_or(0)
        } else {
            0
        };

        let (send_tx, send_rx) = mpsc::channel::<Msg>(window);
        let (fanout_tx, fanout_rx) = mpsc::channel::<Msg>(window);
        let (ack_tx, ack_rx) = mpsc::channel::<u64>(window);
        let (recv_tx, recv_rx) = mpsc::channel::<Vec<u8>>(window);

        let name: Arc<str> = Arc::from(config.name.as_str());
        let recv_buffer = Arc::new(ReceiverBuffer::new(start_seq));
        let send_pending = Arc::new(std::sync::Mutex::new(MinHeap::new()));
        let send_consumer_seq = Arc::new(AtomicU64::new(0));
        let init = Arc::new(InitLatch::new());
        let retry_interval = config.retry_interval;

        let channel = Arc::new(Self {
            name: name.clone(),
            transport: transport.clone(),
            send_tx,
            ack_rx: AsyncMutex::new(ack_rx),
            recv_rx: AsyncMutex::new(recv_rx),
            recv_buffer: recv_buffer.clone(),
            send_pending: send_pending.clone(),
            send_consumer_seq: send_consumer_seq.clone(),
            init,
            retry_interval,
        });

        tokio::spawn(dispatcher_loop(
            send_rx,
            fanout_tx,
            send_pending.clone(),
            shutdown.clone(),
        ));

        let fanout_rx = Arc::new(AsyncMutex::new(fanout_rx));
        for _ in 0..window {
            tokio::spawn(worker_loop(
                name.clone(),
                transport.clone(),
                fanout_rx.clone(),
                send_pending.clone(),
                send_consumer_seq.clone(),
                ack_tx.clone(),
                retry_interval,
                shutdown.clone(),
            ));
        }

        tokio::spawn(reassembly_loop(recv_buffer.clone(), recv_tx, shutdown.clone()));

        if let Some(store_path) = config.store_path.clone() {
            tokio::spawn(checkpoint_loop(
                name.clone(),
                store_path,
                recv_buffer.clone(),
                config.checkpoint_interval,
                shutdown,
            ));
        }

        Ok(channel)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The write-only bounded queue producers enqueue into (§4.1 `Send()`).
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Msg> {
        self.send_tx.clone()
    }

    /// Blocks until the next ack is available, or `None` once every sender
    /// has dropped its handle and the queue has drained.
    pub async fn recv_ack(&self) -> Option<u64> {
        self.ack_rx.lock().await.recv().await
    }

    /// Blocks until the next in-order payload is available (§4.2 `Recv()`).
    pub async fn recv(&self) -> Option<Vec<u8>> {
        self.recv_rx.lock().await.recv().await
    }

    /// True if `seq` is already below the receive cursor — used by the
    /// transport's HTTP handler only to decide the debug log line; the
    /// response is 200 either way.
    #[must_use]
    pub fn is_stale_inbound(&self, seq: u64) -> bool {
        seq < self.recv_buffer.cursor()
    }

    /// Pushes an inbound `{seq, body}` into the receive buffer. Stale
    /// entries are absorbed silently by the buffer itself.
    pub fn push_inbound(&self, msg: Msg) {
        self.recv_buffer.push(msg);
    }

    /// Raises the init latch — called by the local `/sync/{name}` HTTP
    /// handler when the peer's handshake POST arrives.
    pub fn raise_init(&self) {
        self.init.raise();
    }

    /// Issues `POST /sync/{name}` with retry-forever, then blocks until
    /// this channel's own init latch has been raised by an inbound sync.
    pub async fn wait_init(&self) {
        let name = self.name.clone();
        let backoff = Backoff::with_interval(self.retry_interval);
        let _ = retry_on_error(backoff, |_: &TransportError| true, || {
            self.transport.post_sync(&name)
        })
        .await;
        self.init.wait().await;
    }

    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            send_pending: self
                .send_pending
                .lock()
                .expect("send_pending mutex poisoned")
                .len(),
            send_consumer_seq: self.send_consumer_seq.load(Ordering::SeqCst),
            recv_consumer_seq: self.recv_buffer.cursor(),
        }
    }
}

async fn dispatcher_loop(
    mut send_rx: mpsc::Receiver<Msg>,
    fanout_tx: mpsc::Sender<Msg>,
    send_pending: Arc<std::sync::Mutex<MinHeap<u64>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() { return; }
                continue;
            }
            msg = send_rx.recv() => match msg {
                Some(msg) => msg,
                None => return,
            },
        };
        send_pending
            .lock()
            .expect("send_pending mutex poisoned")
            .push(msg.seq);
        if fanout_tx.send(msg).await.is_err() {
            return;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop<T: Transport>(
    name: Arc<str>,
    transport: Arc<T>,
    fanout_rx: Arc<AsyncMutex<mpsc::Receiver<Msg>>>,
    send_pending: Arc<std::sync::Mutex<MinHeap<u64>>>,
    send_consumer_seq: Arc<AtomicU64>,
    ack_tx: mpsc::Sender<u64>,
    retry_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() { return; }
                continue;
            }
            msg = async { fanout_rx.lock().await.recv().await } => match msg {
                Some(msg) => msg,
                None => return,
            },
        };

        // Duplicate from retry after resumption: the window slot is
        // preserved by `continue`ing, not by returning from the worker
        // (the source's `send_loop` worker returns here, permanently
        // starving this slot).
        if send_consumer_seq.load(Ordering::SeqCst) > msg.seq {
            debug!(channel = %name, seq = msg.seq, "duplicate send, ack suppressed");
            retire_duplicate(&send_pending, msg.seq);
            continue;
        }

        let seq = msg.seq;
        let data = msg.data;
        let backoff = Backoff::with_interval(retry_interval);
        let posted = retry_on_error(backoff, |_: &TransportError| true, || {
            transport.post_message(&name, seq, data.clone())
        })
        .await;
        // `retry_on_error` with an always-true predicate and no attempt
        // cap never returns `Err`; the match exists so a future bounded
        // policy fails safe instead of silently dropping the message.
        if posted.is_err() {
            warn!(channel = %name, seq, "giving up on message after exhausting retry budget");
            continue;
        }

        retire_completed(&send_pending, &send_consumer_seq, seq);
        if ack_tx.send(seq).await.is_err() {
            return;
        }
    }
}

async fn reassembly_loop(
    recv_buffer: Arc<ReceiverBuffer>,
    recv_tx: mpsc::Sender<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    recv_buffer.close();
                    return;
                }
            }
            popped = recv_buffer.pop() => {
                match popped {
                    Ok(msg) => {
                        if recv_tx.send(msg.data).await.is_err() {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
        }
    }
}

async fn checkpoint_loop(
    name: Arc<str>,
    store_path: PathBuf,
    recv_buffer: Arc<ReceiverBuffer>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() { return; }
            }
            _ = ticker.tick() => {
                let seq = recv_buffer.cursor();
                if let Err(error) = watermark::write_consumer_seq(&store_path, &name, seq) {
                    warn!(channel = %name, %error, "failed to flush watermark");
                }
            }
        }
    }
}
