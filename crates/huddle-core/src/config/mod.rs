//! Sync configuration shared by every client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_base_url_option};

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_BASE_BACKOFF_SECS: u64 = 2;
const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry schedule for transient push failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Transient failures allowed before an entry becomes `failed`
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_backoff: Duration::from_secs(DEFAULT_BASE_BACKOFF_SECS),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next try after `attempt` consecutive failures
    /// (`base * 2^(attempt - 1)`, capped at `max_backoff`).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_backoff
            .saturating_mul(1_u32 << exponent)
            .min(self.max_backoff)
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Configuration for the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote API base URL, e.g. `https://api.huddle.app`
    pub api_base_url: Option<String>,
    /// How often the background worker drains and pulls
    pub sync_interval: Duration,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Create an empty config (local-only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote API base URL
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = normalize_base_url_option(Some(url.into()));
        self
    }

    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check if a remote is configured
    pub const fn is_remote_configured(&self) -> bool {
        self.api_base_url.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.api_base_url {
            if !is_http_url(url) {
                return Err(Error::InvalidInput(format!(
                    "API base URL must start with http:// or https:// (got '{url}')"
                )));
            }
        }
        if self.sync_interval.is_zero() {
            return Err(Error::InvalidInput(
                "sync interval must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidInput(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
