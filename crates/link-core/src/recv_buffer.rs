//! Per-channel in-order delivery buffer, built over [`MinHeap`].
//!
//! Messages may arrive out of order (concurrent sender workers, retries
//! after a partial failure); `ReceiverBuffer` reorders them and exposes a
//! strictly-sequential `pop`. Stale (already-delivered) messages are
//! dropped silently, matching the idempotence invariant.

use std::cmp::Ordering;
use std::sync::Mutex;

use link_wire::Msg;
use tokio::sync::Notify;

use crate::heap::MinHeap;

/// Wraps a [`Msg`] so the heap orders purely by sequence number.
#[derive(Debug)]
struct BySeq(Msg);

impl PartialEq for BySeq {
    fn eq(&self, other: &Self) -> bool {
        self.0.seq == other.0.seq
    }
}
impl Eq for BySeq {}
impl PartialOrd for BySeq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for BySeq {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.seq.cmp(&other.0.seq)
    }
}

/// The buffer is closed and will never yield another message.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
#[error("receiver buffer closed")]
pub struct BufferClosed;

struct State {
    heap: MinHeap<BySeq>,
    /// Next sequence expected to be delivered.
    seq: u64,
    closed: bool,
}

/// A thread-safe in-order queue keyed by [`Msg::seq`] with min ordering.
pub struct ReceiverBuffer {
    state: Mutex<State>,
    notify: Notify,
}

impl ReceiverBuffer {
    /// Creates a buffer whose first delivered message must have sequence
    /// `start_seq`. Used to prime the cursor from a recovered watermark.
    #[must_use]
    pub fn new(start_seq: u64) -> Self {
        Self {
            state: Mutex::new(State {
                heap: MinHeap::new(),
                seq: start_seq,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Inserts `msg`. Dropped silently if the buffer is closed or the
    /// message is already below the delivery cursor.
    pub fn push(&self, msg: Msg) {
        {
            let mut state = self.state.lock().expect("recv buffer mutex poisoned");
            if state.closed {
                return;
            }
            let seq = state.seq;
            state.heap.push(BySeq(msg));
            if matches!(state.heap.top(), Some(top) if top.0.seq < seq) {
                state.heap.pop();
            }
        }
        self.notify.notify_one();
    }

    /// Blocks until the next in-order message is available, the buffer is
    /// closed with nothing left to deliver, or closed with a gap that can
    /// never close.
    pub async fn pop(&self) -> Result<Msg, BufferClosed> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().expect("recv buffer mutex poisoned");
                loop {
                    let Some(top) = state.heap.top() else {
                        if state.closed {
                            return Err(BufferClosed);
                        }
                        break;
                    };
                    match top.0.seq.cmp(&state.seq) {
                        Ordering::Less => {
                            state.heap.pop();
                        }
                        Ordering::Greater => {
                            if state.closed {
                                return Err(BufferClosed);
                            }
                            break;
                        }
                        Ordering::Equal => {
                            let msg = state.heap.pop().expect("top just observed").0;
                            state.seq += 1;
                            return Ok(msg);
                        }
                    }
                }
            }
            notified.await;
        }
    }

    /// Marks the buffer closed and wakes every blocked `pop`.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().expect("recv buffer mutex poisoned");
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    /// The next sequence this buffer expects to deliver.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.state.lock().expect("recv buffer mutex poisoned").seq
    }
}
