//! Retry with exponential backoff and jitter for catalog lookups.
//!
//! Downloads are not retried: a failed download leaves nothing behind and the
//! user can rerun. Catalog lookups are small and idempotent, so transient
//! failures (timeouts, 5xx surfaced as network errors, 429) get a few more tries.

use crate::cancel::CancellationToken;
use crate::error::{Result, UpdaterError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::NetworkConfig::MAX_RETRIES,
            base_delay: crate::config::NetworkConfig::RETRY_BASE_DELAY,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (0-indexed): `base * 2^attempt`,
    /// capped, then scaled by a random factor in `0.5..1.5` when jitter is on.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_secs = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());

        let final_secs = if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            (capped_secs * factor).min(self.max_delay.as_secs_f64())
        } else {
            capped_secs
        };

        Duration::from_secs_f64(final_secs)
    }

    /// A server-provided `Retry-After` wins over the computed backoff.
    fn delay_for(&self, attempt: u32, err: &UpdaterError) -> Duration {
        match err {
            UpdaterError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Duration::from_secs(*secs).min(self.max_delay),
            _ => self.calculate_delay(attempt),
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, runs
/// out of attempts, or `cancel` fires.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        cancel.check()?;

        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() || cancel.is_cancelled() {
            return Err(err);
        }
        if attempt + 1 >= config.max_attempts {
            warn!(
                "All {} attempts exhausted. Last error: {}",
                config.max_attempts, err
            );
            return Err(err);
        }

        let delay = config.delay_for(attempt, &err);
        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt + 1,
            config.max_attempts,
            err,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
