//! Retry policy for upstream fetches.
//!
//! Every failure is retried, including malformed payloads; the upstream
//! occasionally returns partial documents that succeed on a second try.

use std::time::Duration;

use reqwest::StatusCode;

use crate::config::UpstreamConfig;
use crate::utils::constants::{DEFAULT_BACKOFF_BASE_SECS, DEFAULT_MAX_ATTEMPTS};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before retry n is `backoff_base^(n-1)` seconds
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base_secs: u64) -> Self {
        Self {
            max_attempts,
            backoff_base_secs,
        }
    }

    /// No waiting between attempts, for tests against a local mock
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base_secs: 0,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_base_secs)
    }

    /// Delay to sleep before the given retry (1-based)
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        if self.backoff_base_secs == 0 {
            return Duration::ZERO;
        }
        let exponent = retry.saturating_sub(1);
        Duration::from_secs(self.backoff_base_secs.saturating_pow(exponent))
    }

    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Human-readable classification used in retry log lines
pub fn describe_failure(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        return "timeout";
    }
    if error.is_connect() {
        return "connection";
    }
    match error.status() {
        Some(StatusCode::TOO_MANY_REQUESTS) => "rate limited",
        Some(status) if status.is_server_error() => "server error",
        Some(status) if status.is_client_error() => "client error",
        _ => "request",
    }
}
