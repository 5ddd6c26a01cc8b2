// src/utils/retry.rs

//! Bounded retry with exponential backoff.
//!
//! One policy value is shared by every I/O-bound collaborator (listing
//! fetch, detail pages, PDF download) so attempt counts and backoff live in
//! one place instead of being scattered through the fetch code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Classifies which errors are worth retrying.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for reqwest::Error {
    fn is_retryable(&self) -> bool {
        if self.is_timeout() || self.is_connect() {
            return true;
        }
        match self.status() {
            Some(status) => status.is_server_error() || status.as_u16() == 429,
            None => self.is_request(),
        }
    }
}

/// Retry policy: attempt count and backoff schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds
    #[serde(default = "defaults::initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff multiplier applied after each failed attempt
    #[serde(default = "defaults::multiplier")]
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            initial_backoff_ms: defaults::initial_backoff_ms(),
            multiplier: defaults::multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, the error is not retryable, or all
    /// attempts are exhausted. Returns the last error on failure.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> std::result::Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.initial_backoff_ms);

        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= attempts || !error.is_retryable() {
                        return Err(error);
                    }
                    log::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        label,
                        attempt,
                        attempts,
                        error,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.mul_f64(self.multiplier.max(1.0));
                    attempt += 1;
                }
            }
        }
    }
}

mod defaults {
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn initial_backoff_ms() -> u64 {
        1000
    }
    pub fn multiplier() -> f64 {
        2.0
    }
}
