use crate::{BatchPoints, PointWriter, RetryError};
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with exponential backoff plus random jitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Wait before retry number `n` (0-based): `delay * 2^n` plus up to
    /// `max_jitter` of noise.
    pub fn backoff(&self, n: u32) -> Duration {
        let base = self.delay.saturating_mul(1u32 << n.min(20));
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        base.saturating_add(Duration::from_millis(jitter))
    }
}

/// Write `batch`, retrying any error up to `policy.attempts` times in total.
/// Returns the number of attempts used on success.
pub fn retry_write<W: PointWriter + ?Sized>(
    writer: &mut W,
    batch: &BatchPoints,
    policy: &RetryPolicy,
) -> Result<u32, RetryError> {
    let attempts = policy.attempts.max(1);
    let mut n = 0;
    loop {
        n += 1;
        match writer.write(batch) {
            Ok(()) => return Ok(n),
            Err(e) if n >= attempts => {
                return Err(RetryError {
                    attempts: n,
                    last: e,
                })
            }
            Err(e) => {
                let wait = policy.backoff(n - 1);
                warn!(
                    "write attempt {}/{} failed: {}; retrying in {:?}",
                    n, attempts, e, wait
                );
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
            }
        }
    }
}
