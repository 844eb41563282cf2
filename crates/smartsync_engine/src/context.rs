//! Request execution shared by targets during one sync run.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::network::NetworkClient;
use serde_json::Value;
use smartsync_protocol::{RestRequest, RestResponse};
use tracing::{debug, warn};

/// What a target sees of the engine while fetching or pushing.
///
/// Every request gets the configured timeout and user agent. Retryable
/// failures of GET, PATCH and DELETE requests are retried per
/// [`crate::RetryConfig`]; a POST is sent once, since a lost reply may
/// hide a record the server already created. Non-2xx responses become
/// [`SyncError::Http`].
pub struct RestContext<'a> {
    network: &'a dyn NetworkClient,
    config: &'a SyncConfig,
}

impl<'a> RestContext<'a> {
    /// Creates a context over a network client.
    pub fn new(network: &'a dyn NetworkClient, config: &'a SyncConfig) -> Self {
        Self { network, config }
    }

    /// Returns the REST API version.
    pub fn api_version(&self) -> &str {
        &self.config.api_version
    }

    /// Returns the configured page size.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Sends a request and fails on non-2xx responses.
    pub fn send(&self, request: RestRequest) -> SyncResult<RestResponse> {
        self.send_allowing(request, &[])
    }

    /// Sends a request, accepting the listed statuses besides 2xx.
    pub fn send_allowing(&self, request: RestRequest, accepted: &[u16]) -> SyncResult<RestResponse> {
        let mut request = request;
        if request.timeout.is_none() {
            request.timeout = Some(self.config.request_timeout);
        }
        request
            .headers
            .entry("User-Agent".into())
            .or_insert_with(|| self.config.user_agent.clone());

        let retry = &self.config.retry;
        let max_attempts = if request.method.is_idempotent() {
            retry.max_attempts
        } else {
            1
        };
        let mut attempt = 0;
        loop {
            let delay = retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            let result = self.network.send(&request).and_then(|response| {
                if response.is_success() || accepted.contains(&response.status) {
                    Ok(response)
                } else {
                    Err(SyncError::Http {
                        status: response.status,
                        message: response.error_message(),
                    })
                }
            });

            match result {
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    warn!(path = %request.path, attempt, error = %e, "retrying request");
                    attempt += 1;
                }
                other => {
                    debug!(
                        method = %request.method,
                        path = %request.path,
                        ok = other.is_ok(),
                        "request done"
                    );
                    return other;
                }
            }
        }
    }

    /// Sends a request and returns its JSON body (`Null` when empty).
    pub fn send_json(&self, request: RestRequest) -> SyncResult<Value> {
        let response = self.send(request)?;
        Ok(response.body.unwrap_or(Value::Null))
    }
}
