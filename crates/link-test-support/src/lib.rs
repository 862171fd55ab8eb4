//! Shared test doubles for the link workspace: a fault-injecting
//! [`Transport`](link_core::Transport) wrapper and a mock HTTP/2 peer,
//! used by both this crate's own tests and the root integration suite.

pub mod flaky_transport;
pub mod mock_peer;

pub use flaky_transport::FlakyTransport;
pub use mock_peer::{MockPeer, RecordedPost};
