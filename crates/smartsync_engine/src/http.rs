//! HTTP network client.
//!
//! The actual HTTP library is abstracted by [`HttpClient`], so any blocking
//! client (ureq, reqwest::blocking, an in-process server) can carry the
//! REST calls of a sync run.

use crate::error::{SyncError, SyncResult};
use crate::network::NetworkClient;
use parking_lot::RwLock;
use smartsync_protocol::{RestMethod, RestRequest, RestResponse, SERVICES_DATA};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::trace;

/// A raw HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: RestMethod,
    /// Absolute URL.
    pub url: String,
    /// Headers.
    pub headers: BTreeMap<String, String>,
    /// Encoded body, empty when there is none.
    pub body: Vec<u8>,
    /// Timeout for the whole exchange.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Path and query of the URL, starting at `/services/`.
    pub fn path(&self) -> &str {
        self.url
            .find(SERVICES_DATA)
            .map_or(self.url.as_str(), |i| &self.url[i..])
    }
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implementations return every response, whatever its status; `Err` is for
/// failures to complete the exchange at all.
pub trait HttpClient: Send + Sync {
    /// Executes a request.
    fn execute(&self, request: &HttpRequest) -> Result<HttpReply, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// Network client speaking to a REST instance over an [`HttpClient`].
///
/// Adds the instance URL, the bearer token and JSON headers to every
/// request.
pub struct RestClient<C: HttpClient> {
    instance_url: String,
    access_token: RwLock<String>,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> RestClient<C> {
    /// Creates a client for `instance_url` (e.g. `https://acme.my.example.com`).
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>, client: C) -> Self {
        let instance_url: String = instance_url.into();
        Self {
            instance_url: instance_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(access_token.into()),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the instance URL.
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// Replaces the access token, e.g. after a refresh.
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write() = token.into();
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true if the client is open and healthy.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Closes the client; later requests fail with [`SyncError::NotConnected`].
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn to_http(&self, request: &RestRequest) -> SyncResult<HttpRequest> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.access_token.read()),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());
        let body = match &request.body {
            Some(body) => {
                headers.insert("Content-Type".to_string(), "application/json".to_string());
                serde_json::to_vec(body).map_err(|e| SyncError::Protocol(e.into()))?
            }
            None => Vec::new(),
        };
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(HttpRequest {
            method: request.method,
            url: format!("{}{}", self.instance_url, request.path),
            headers,
            body,
            timeout: request.timeout,
        })
    }
}

impl<C: HttpClient> NetworkClient for RestClient<C> {
    fn send(&self, request: &RestRequest) -> SyncResult<RestResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let http = self.to_http(request)?;
        trace!(method = %http.method, url = %http.url, "http request");

        let reply = self.client.execute(&http).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            SyncError::transport_retryable(e)
        })?;
        *self.last_error.write() = None;

        let body = RestResponse::parse_body(&reply.body)?;
        Ok(RestResponse::new(reply.status, body))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request whose URL has been reduced to its path.
    fn handle(&self, request: &HttpRequest) -> HttpReply;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpReply, String> {
        let mut local = request.clone();
        local.url = request.path().to_string();
        Ok(self.server.handle(&local))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
