//! Main reference server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::query::project;
use serde_json::Value;
use smartsync_protocol::{RestMethod, RestRequest, RestResponse};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The reference REST server.
///
/// Answers the query, search, record and composite endpoints a sync run
/// talks to, backed by in-memory records. Tests seed and inspect records
/// through the admin helpers, which bypass authentication and failure
/// injection.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use smartsync_protocol::{QueryResponse, RestRequest};
/// use smartsync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// server.insert_record("Account", json!({"Name": "Acme"})).unwrap();
///
/// let request = RestRequest::for_query("v60.0", "select Id, Name from Account").unwrap();
/// let response = server.handle(&request);
/// let page = QueryResponse::from_json(response.as_json()).unwrap();
/// assert_eq!(page.records[0]["Name"], "Acme");
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new server.
    pub fn new(config: ServerConfig) -> Self {
        let context = Arc::new(HandlerContext::new(config));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Handles a request.
    pub fn handle(&self, request: &RestRequest) -> RestResponse {
        self.handler.handle(request)
    }

    /// Handles a raw HTTP exchange and returns the status and encoded body.
    ///
    /// `path` starts at `/services/data`.
    pub fn handle_raw(
        &self,
        method: &str,
        path: &str,
        headers: &BTreeMap<String, String>,
        body: &[u8],
    ) -> (u16, Vec<u8>) {
        let response = match Self::decode(method, path, headers, body) {
            Ok(request) => self.handle(&request),
            Err(e) => e.to_response(),
        };
        let bytes = response
            .body
            .as_ref()
            .and_then(|body| serde_json::to_vec(body).ok())
            .unwrap_or_default();
        (response.status, bytes)
    }

    fn decode(
        method: &str,
        path: &str,
        headers: &BTreeMap<String, String>,
        body: &[u8],
    ) -> ServerResult<RestRequest> {
        let method = RestMethod::parse(method).ok_or_else(|| ServerError::MethodNotAllowed(method.to_string()))?;
        let body = RestResponse::parse_body(body).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        let mut request = RestRequest::new(method, path);
        request.headers = headers.clone();
        request.body = body;
        Ok(request)
    }

    /// Issues an access token, if authentication is enabled.
    pub fn create_token(&self, user: &str) -> Option<String> {
        self.context.create_token(user)
    }

    /// Inserts a record directly and returns its id.
    pub fn insert_record(&self, object_type: &str, fields: Value) -> ServerResult<String> {
        self.context.objects.write().create(object_type, &fields)
    }

    /// Updates a record directly, stamping a new modification date.
    pub fn update_record(&self, object_type: &str, id: &str, fields: Value) -> ServerResult<()> {
        self.context.objects.write().update(object_type, id, &fields)
    }

    /// Deletes a record directly.
    pub fn delete_record(&self, object_type: &str, id: &str) -> ServerResult<()> {
        self.context.objects.write().delete(object_type, id)
    }

    /// Returns a copy of one record.
    pub fn get_record(&self, object_type: &str, id: &str) -> Option<Value> {
        self.context
            .objects
            .read()
            .get(object_type, id)
            .ok()
            .map(|record| Value::Object(record.clone()))
    }

    /// Returns copies of all records of `object_type`, ordered by id.
    pub fn records(&self, object_type: &str) -> Vec<Value> {
        self.context
            .objects
            .read()
            .records(object_type)
            .into_iter()
            .map(|record| Value::Object(record.clone()))
            .collect()
    }

    /// Returns selected fields of all records of `object_type`.
    pub fn project_records(&self, object_type: &str, fields: &[String]) -> Vec<Value> {
        self.context
            .objects
            .read()
            .records(object_type)
            .into_iter()
            .map(|record| project(record, fields))
            .collect()
    }

    /// Number of records of `object_type`.
    pub fn record_count(&self, object_type: &str) -> usize {
        self.context.objects.read().count(object_type)
    }

    /// Declares an object type so it can be queried before it has records.
    pub fn define_object(&self, object_type: &str) {
        self.context.objects.write().define_type(object_type);
    }

    /// Marks a record as recently viewed.
    pub fn mark_viewed(&self, object_type: &str, id: &str) -> ServerResult<()> {
        let mut objects = self.context.objects.write();
        objects.get(object_type, id)?;
        objects.touch_recent(object_type, id);
        Ok(())
    }

    /// Current logical time in epoch milliseconds.
    pub fn now(&self) -> i64 {
        self.context.objects.read().now()
    }

    /// Moves the logical clock forward.
    pub fn advance_clock(&self, millis: i64) {
        self.context.objects.write().advance_clock(millis);
    }

    /// Fails requests whose path or query contains `pattern`, `times` times
    /// or forever.
    pub fn fail_requests_matching(&self, pattern: &str, status: u16, times: Option<usize>) {
        self.context.fail_requests_matching(pattern, status, times);
    }

    /// Fails every retrieve, update and delete of record `id`.
    pub fn fail_record(&self, id: &str, status: u16) {
        self.context.fail_record(id, status);
    }

    /// Removes all failure rules.
    pub fn clear_failures(&self) {
        self.context.clear_failures();
    }

    /// Number of requests handled.
    pub fn request_count(&self) -> u64 {
        self.context.request_count()
    }

    /// `METHOD path` of every request handled so far.
    pub fn request_log(&self) -> Vec<String> {
        self.context.request_log()
    }

    /// Number of query cursors with pages left to serve.
    pub fn open_cursors(&self) -> usize {
        self.context.open_cursors()
    }
}
