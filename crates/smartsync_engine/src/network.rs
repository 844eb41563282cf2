//! Network client abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::Value;
use smartsync_protocol::{RestRequest, RestResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A network client executes authenticated REST requests.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, loopback to an in-process server, mocks).
/// Implementations return the response whatever its status; mapping
/// non-2xx statuses to errors is done by the sync engine.
pub trait NetworkClient: Send + Sync {
    /// Sends a request and returns the server's response.
    fn send(&self, request: &RestRequest) -> SyncResult<RestResponse>;
}

impl<T: NetworkClient + ?Sized> NetworkClient for Arc<T> {
    fn send(&self, request: &RestRequest) -> SyncResult<RestResponse> {
        (**self).send(request)
    }
}

/// A scripted network client for testing.
///
/// Replies are returned in FIFO order; every request is recorded.
#[derive(Debug)]
pub struct MockNetwork {
    connected: AtomicBool,
    replies: Mutex<VecDeque<SyncResult<RestResponse>>>,
    requests: Mutex<Vec<RestRequest>>,
}

impl MockNetwork {
    /// Creates a connected mock with no scripted replies.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a response.
    pub fn push_response(&self, response: RestResponse) {
        self.replies.lock().push_back(Ok(response));
    }

    /// Queues a response with the given status and JSON body.
    pub fn push_json(&self, status: u16, body: Value) {
        self.push_response(RestResponse::new(status, Some(body)));
    }

    /// Queues an error.
    pub fn push_error(&self, error: SyncError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of replies not consumed yet.
    pub fn pending_replies(&self) -> usize {
        self.replies.lock().len()
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClient for MockNetwork {
    fn send(&self, request: &RestRequest) -> SyncResult<RestResponse> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_fatal("no scripted response")))
    }
}
