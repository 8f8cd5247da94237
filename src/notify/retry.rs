//! Exponential backoff retry around any [`Notifier`].
//!
//! # Retry Strategy
//!
//! - Up to `max_retries` further attempts after the first failure, per recipient
//! - Delay starts at `base_delay` and doubles each attempt
//! - Delay capped at 30 seconds
//! - Random jitter (0-250ms) added so recipients are not hit in lockstep

use super::Notifier;
use crate::error::NotifyError;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Wraps a [`Notifier`] and retries failed sends with backoff.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryNotifier<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl<T> RetryNotifier<T>
where
    T: Notifier,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }

    /// Disable random jitter, giving deterministic delays.
    #[cfg(test)]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        if self.jitter {
            delay + Duration::from_millis(rng().random_range(0..=250))
        } else {
            delay
        }
    }
}

impl<T> fmt::Debug for RetryNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryNotifier")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Notifier for RetryNotifier<T>
where
    T: Notifier,
{
    #[instrument(level = "debug", skip_all, fields(%recipient))]
    async fn send(&self, message: &str, recipient: &str) -> Result<(), NotifyError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.send(message, recipient).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "send() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "send() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
