//! Bounded retry for startup calls
//!
//! Reconcile passes never retry in place; they return and let the requeue
//! policy reschedule them. Startup work (CRD installation, the first API
//! server round trip) has no scheduler behind it, so it retries here.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::controller::backoff_delay;

/// Retry limits for startup calls
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Attempts before giving up (0 = retry forever)
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Cap on the delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` is exhausted.
///
/// Delays double from `initial_delay` up to `max_delay` with 0.5x-1.5x jitter.
/// Returns the last error when attempts run out.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    error!(operation = %operation_name, attempt, error = %e, "Giving up after max retries");
                    return Err(e);
                }

                let delay = backoff_delay(config.initial_delay, config.max_delay, attempt - 1);
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
