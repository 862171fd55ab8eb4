//! A fault-injecting [`Transport`] wrapper for exercising the sender's
//! retry loop without a real flaky network.

use std::collections::HashMap;
use std::sync::Mutex;

use link_core::transport::{Transport, TransportError};

/// Wraps an inner transport, failing the next N `post_message` calls for a
/// given `(channel, seq)` before delegating to the real one.
pub struct FlakyTransport<T: Transport> {
    inner: T,
    fail_next: Mutex<HashMap<(String, u64), u32>>,
}

impl<T: Transport> FlakyTransport<T> {
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            fail_next: Mutex::new(HashMap::new()),
        }
    }

    /// Makes the next `times` posts for `(channel, seq)` fail before
    /// succeeding.
    pub fn fail_next(&self, channel: &str, seq: u64, times: u32) {
        self.fail_next
            .lock()
            .unwrap()
            .insert((channel.to_owned(), seq), times);
    }

    fn should_fail(&self, channel: &str, seq: u64) -> bool {
        let mut fail_next = self.fail_next.lock().unwrap();
        if let Some(remaining) = fail_next.get_mut(&(channel.to_owned(), seq)) {
            if *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

impl<T: Transport> Transport for FlakyTransport<T> {
    async fn post_message(
        &self,
        channel: &str,
        seq: u64,
        body: Vec<u8>,
    ) -> Result<(), TransportError> {
        if self.should_fail(channel, seq) {
            return Err(TransportError::Status {
                channel: channel.to_owned(),
                status: 503,
            });
        }
        self.inner.post_message(channel, seq, body).await
    }

    async fn post_sync(&self, channel: &str) -> Result<(), TransportError> {
        self.inner.post_sync(channel).await
    }
}
