//! Retry policy for the enumeration pass.
//!
//! Политика явная: максимум попыток (или без ограничения) + экспоненциальный backoff
//! с потолком. Успешный проход не повторяется никогда; повторяется только Err.

use anyhow::Result;
use log::{info, warn};
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// max_attempts: None: повторять бесконечно; Some(0) трактуется как Some(1).
    pub fn new(max_attempts: Option<u32>, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.map(|n| n.max(1)),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Retry forever. Must be chosen explicitly.
    pub fn unbounded(initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self::new(None, initial_backoff, max_backoff)
    }

    /// Single attempt, no retry.
    pub fn no_retry() -> Self {
        Self::new(Some(1), Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay after `failed` consecutive failures (failed >= 1): initial * 2^(failed-1), capped.
    pub fn backoff_for(&self, failed: u32) -> Duration {
        if failed == 0 {
            return Duration::ZERO;
        }
        let shift = (failed - 1).min(31);
        let d = self.initial_backoff.saturating_mul(1u32 << shift);
        d.min(self.max_backoff)
    }

    fn exhausted(&self, attempts: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempts >= max)
    }

    /// Run `op` until it returns Ok or the policy gives up.
    ///
    /// `op` receives the 1-based attempt number. Returns the value together with the
    /// number of attempts spent. On give-up the last error is returned with context.
    pub fn run<T, F>(&self, target: &str, what: &str, mut op: F) -> Result<(T, u32)>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match op(attempt) {
                Ok(v) => {
                    if attempt > 1 {
                        info!(target: target, "{} succeeded on attempt {}", what, attempt);
                    }
                    return Ok((v, attempt));
                }
                Err(e) => {
                    if self.exhausted(attempt) {
                        return Err(e.context(format!(
                            "{} failed after {} attempt(s)",
                            what, attempt
                        )));
                    }
                    let delay = self.backoff_for(attempt);
                    warn!(
                        target: target,
                        "retry {}: attempt {} failed: {:#} (retry in {} ms)",
                        what,
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use crate::consts::{
            DEFAULT_BACKOFF_INITIAL_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_MAX_ATTEMPTS,
        };
        Self::new(
            Some(DEFAULT_MAX_ATTEMPTS),
            Duration::from_millis(DEFAULT_BACKOFF_INITIAL_MS),
            Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
        )
    }
}
