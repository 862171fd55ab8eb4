//! Constant-backoff retry loop, as used by sender workers and the init
//! handshake POST.
//!
//! Grounded on the source's `AlwaysRetry` backoff: unbounded steps, a fixed
//! 5-second interval, no exponential factor, no jitter. Exposed here as a
//! small [`Backoff`] policy so callers can override the interval (tests use
//! a much shorter one) without reimplementing the loop.

use std::time::Duration;

use tracing::warn;

/// A constant-interval, optionally-bounded retry policy.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    interval: Duration,
    max_attempts: Option<u64>,
}

impl Backoff {
    /// The link's default: unbounded retries, 5-second constant interval.
    #[must_use]
    pub fn always_retry() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: None,
        }
    }

    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Retries `op` until it succeeds, `retriable` rejects its error, or the
/// backoff's attempt budget (if any) is exhausted.
///
/// Mirrors the source's `OnError(backoff, retriable, fn)`: `retriable`
/// decides whether a given error is worth retrying at all; a
/// non-retriable error is returned immediately instead of being retried
/// into the backoff's sleep.
pub async fn retry_on_error<T, E, Op, Fut, Retriable>(
    backoff: Backoff,
    retriable: Retriable,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    Retriable: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt: u64 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if retriable(&err) => {
                attempt += 1;
                if let Some(max) = backoff.max_attempts {
                    if attempt >= max {
                        return Err(err);
                    }
                }
                warn!(attempt, error = %err, "retrying after error");
                tokio::time::sleep(backoff.interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}
