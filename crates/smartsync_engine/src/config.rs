//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "v60.0";

/// Default number of records per page, for both store scans and query batches.
pub const DEFAULT_PAGE_SIZE: usize = 2000;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// REST API version, e.g. `v60.0`.
    pub api_version: String,
    /// Page size for store scans and the requested query batch size.
    pub page_size: usize,
    /// Retry configuration for individual requests.
    pub retry: RetryConfig,
    /// Timeout attached to every request.
    pub request_timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl SyncConfig {
    /// Creates a configuration for the given API version.
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig::no_retry(),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("SmartSync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Rejects configurations a sync run cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api_version.trim().is_empty() {
            return Err(SyncError::InvalidConfig("api version must not be empty".into()));
        }
        if self.page_size == 0 {
            return Err(SyncError::InvalidConfig("page size must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::InvalidConfig("retry needs at least one attempt".into()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_VERSION)
    }
}

/// Configuration for retry behavior.
///
/// Applies to GET, PATCH and DELETE requests only. POST requests, which
/// include record creates and composite batches, are never retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with exponential backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Delay before attempt `attempt` (0-indexed; the first attempt never waits).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% on top of the capped delay
            Duration::from_secs_f64(capped * (1.0 + 0.25 * jitter_fraction()))
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// A fraction in `[0, 1)` drawn from a v4 uuid's random bits.
fn jitter_fraction() -> f64 {
    const MANTISSA: u64 = (1 << 53) - 1;
    // The low 53 bits sit below the variant field and are fully random
    let bits = (uuid::Uuid::new_v4().as_u128() as u64) & MANTISSA;
    bits as f64 / (MANTISSA + 1) as f64
}
