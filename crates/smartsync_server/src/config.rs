//! Server configuration.

use std::time::Duration;

/// Configuration for the reference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// API versions the server answers to, e.g. `v60.0`.
    pub api_versions: Vec<String>,
    /// Query page size when the client does not ask for one.
    pub default_batch_size: usize,
    /// Smallest accepted `batchSize` query option.
    pub min_batch_size: usize,
    /// Largest accepted `batchSize` query option.
    pub max_batch_size: usize,
    /// Recent items kept per object type.
    pub max_recent_items: usize,
    /// Epoch milliseconds of the logical clock's first tick.
    pub clock_start: i64,
    /// Milliseconds the logical clock advances per write.
    pub clock_step: i64,
    /// Whether requests need a bearer token.
    pub require_auth: bool,
    /// Secret key for token validation (if auth enabled).
    pub auth_secret: Option<Vec<u8>>,
    /// Lifetime of issued tokens.
    pub token_expiry: Duration,
}

impl ServerConfig {
    /// Creates a configuration answering to one API version.
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_versions: vec![api_version.into()],
            default_batch_size: 2000,
            min_batch_size: 1,
            max_batch_size: 2000,
            max_recent_items: 200,
            clock_start: 1_704_067_200_000,
            clock_step: 1_000,
            require_auth: false,
            auth_secret: None,
            token_expiry: Duration::from_secs(2 * 60 * 60),
        }
    }

    /// Also answers to `api_version`.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_versions.push(api_version.into());
        self
    }

    /// Sets the default query page size.
    pub fn with_default_batch_size(mut self, size: usize) -> Self {
        self.default_batch_size = size;
        self
    }

    /// Sets the accepted `batchSize` range.
    pub fn with_batch_size_range(mut self, min: usize, max: usize) -> Self {
        self.min_batch_size = min;
        self.max_batch_size = max;
        self
    }

    /// Sets how many recent items are kept per object type.
    pub fn with_max_recent_items(mut self, max: usize) -> Self {
        self.max_recent_items = max;
        self
    }

    /// Sets the logical clock's start and step.
    pub fn with_clock(mut self, start: i64, step: i64) -> Self {
        self.clock_start = start;
        self.clock_step = step.max(1);
        self
    }

    /// Enables authentication with the given secret.
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.require_auth = true;
        self.auth_secret = Some(secret);
        self
    }

    /// Sets the token lifetime.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Clamps a requested page size to the accepted range.
    pub fn batch_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_batch_size)
            .clamp(self.min_batch_size.max(1), self.max_batch_size.max(1))
    }

    /// Returns true if the server answers to `api_version`.
    pub fn supports_version(&self, api_version: &str) -> bool {
        self.api_versions.iter().any(|v| v == api_version)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("v60.0")
    }
}
