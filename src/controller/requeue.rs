//! Per-object requeue policy
//!
//! Each object key gets its own counters so one stuck snapshot backs off
//! without slowing the rest. Waiting and failing are counted separately: a
//! request that waits a long time on a slow snapshotter does not inherit an
//! error backoff and vice versa.

use std::time::Duration;

use dashmap::DashMap;
use kube::runtime::controller::Action;
use rand::Rng;

use super::Outcome;

/// Requeue intervals for polling and error backoff
#[derive(Clone, Debug, PartialEq)]
pub struct RequeueConfig {
    /// Delay after progress and for the first not-ready poll
    pub poll_interval: Duration,
    /// Cap for repeated not-ready polls
    pub max_poll_interval: Duration,
    /// Delay after the first failed pass
    pub error_backoff: Duration,
    /// Cap for repeated failures
    pub max_error_backoff: Duration,
    /// Spread delays by ±20%
    pub jitter: bool,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(5),
            max_error_backoff: Duration::from_secs(300),
            jitter: true,
        }
    }
}

/// `base * 2^attempt`, capped at `max`
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

/// Tracks consecutive waits and failures per object key
#[derive(Debug, Default)]
pub struct RequeueTracker {
    config: RequeueConfig,
    waits: DashMap<String, u32>,
    failures: DashMap<String, u32>,
}

impl RequeueTracker {
    /// Create a tracker with the given intervals
    pub fn new(config: RequeueConfig) -> Self {
        Self {
            config,
            waits: DashMap::new(),
            failures: DashMap::new(),
        }
    }

    /// Intervals this tracker was built with
    pub fn config(&self) -> &RequeueConfig {
        &self.config
    }

    /// Action for a pass that returned `outcome`
    pub fn on_outcome(&self, key: &str, outcome: Outcome) -> Action {
        self.failures.remove(key);
        match outcome {
            Outcome::Done => {
                self.waits.remove(key);
                Action::await_change()
            }
            Outcome::Progressed => {
                self.waits.remove(key);
                Action::requeue(self.jittered(self.config.poll_interval, self.config.poll_interval))
            }
            Outcome::Waiting => {
                let attempt = bump(&self.waits, key);
                let delay = backoff_delay(
                    self.config.poll_interval,
                    self.config.max_poll_interval,
                    attempt,
                );
                Action::requeue(self.jittered(delay, self.config.max_poll_interval))
            }
        }
    }

    /// Action for a pass that failed
    pub fn on_error(&self, key: &str) -> Action {
        let attempt = bump(&self.failures, key);
        let delay = backoff_delay(
            self.config.error_backoff,
            self.config.max_error_backoff,
            attempt,
        );
        Action::requeue(self.jittered(delay, self.config.max_error_backoff))
    }

    /// Drop every counter for `key`, e.g. once its object is deleted
    pub fn forget(&self, key: &str) {
        self.waits.remove(key);
        self.failures.remove(key);
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        let mut keys: Vec<String> = self.waits.iter().map(|e| e.key().clone()).collect();
        keys.extend(self.failures.iter().map(|e| e.key().clone()));
        keys.sort();
        keys.dedup();
        keys.len()
    }

    fn jittered(&self, delay: Duration, max: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_secs_f64(delay.as_secs_f64() * factor).min(max)
    }
}

/// Returns the count before incrementing, so the first call yields 0
fn bump(counters: &DashMap<String, u32>, key: &str) -> u32 {
    let mut entry = counters.entry(key.to_string()).or_insert(0);
    let attempt = *entry;
    *entry = attempt.saturating_add(1);
    attempt
}
