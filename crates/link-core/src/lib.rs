//! The channel engine: MinHeap, ReceiverBuffer, Retry, watermark
//! persistence, and the per-named-channel send/recv/ack machinery.
//!
//! Transport-agnostic — see [`transport::Transport`] for the contract the
//! sender and init handshake depend on, implemented concretely by
//! `link-transport`.

pub mod channel;
pub mod heap;
pub mod recv_buffer;
pub mod retry;
pub mod transport;
pub mod watermark;

pub use channel::{Channel, ChannelConfig, ChannelError, ChannelStats};
pub use heap::MinHeap;
pub use recv_buffer::{BufferClosed, ReceiverBuffer};
pub use retry::{retry_on_error, Backoff};
pub use transport::{Transport, TransportError};
