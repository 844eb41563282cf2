//! Request handlers for the REST endpoints.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::objects::ObjectTable;
use crate::query::{project, SoqlQuery, SoslSearch};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use smartsync_protocol::{
    names, CompositeSubresponse, QueryResponse, RestMethod, RestRequest, RestResponse, SERVICES_DATA,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Remaining pages of a query.
#[derive(Debug, Clone)]
struct PendingQuery {
    rows: Vec<Value>,
    page_size: usize,
}

/// A request-level failure rule.
#[derive(Debug, Clone)]
struct FailureRule {
    pattern: String,
    status: u16,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct Failures {
    rules: Vec<FailureRule>,
    records: HashMap<String, u16>,
}

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Server-side records.
    pub objects: RwLock<ObjectTable>,
    cursors: Mutex<HashMap<String, PendingQuery>>,
    failures: Mutex<Failures>,
    validator: Option<TokenValidator>,
    request_count: AtomicU64,
    request_log: Mutex<Vec<String>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig) -> Self {
        let objects = ObjectTable::new(
            config.api_versions.first().cloned().unwrap_or_default(),
            config.clock_start,
            config.clock_step,
            config.max_recent_items,
        );
        let validator = match (&config.auth_secret, config.require_auth) {
            (Some(secret), true) => Some(TokenValidator::new(
                AuthConfig::new(secret.clone()).with_expiry(config.token_expiry),
            )),
            _ => None,
        };
        Self {
            config,
            objects: RwLock::new(objects),
            cursors: Mutex::new(HashMap::new()),
            failures: Mutex::new(Failures::default()),
            validator,
            request_count: AtomicU64::new(0),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Issues an access token, if authentication is enabled.
    pub fn create_token(&self, user: &str) -> Option<String> {
        self.validator.as_ref().map(|v| v.create_token(user))
    }

    /// Fails every request whose path or query contains `pattern`.
    ///
    /// `times` limits how often the rule fires; `None` keeps it forever.
    pub fn fail_requests_matching(&self, pattern: &str, status: u16, times: Option<usize>) {
        self.failures.lock().rules.push(FailureRule {
            pattern: pattern.to_string(),
            status,
            remaining: times,
        });
    }

    /// Fails every retrieve, update and delete of record `id`.
    pub fn fail_record(&self, id: &str, status: u16) {
        self.failures.lock().records.insert(id.to_string(), status);
    }

    /// Removes all failure rules.
    pub fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    /// Number of requests handled, composite subrequests excluded.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of query cursors with pages left to serve.
    pub fn open_cursors(&self) -> usize {
        self.cursors.lock().len()
    }

    /// `METHOD path` of every request handled so far.
    pub fn request_log(&self) -> Vec<String> {
        self.request_log.lock().clone()
    }

    fn record_request(&self, request: &RestRequest) {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.request_log
            .lock()
            .push(format!("{} {}", request.method, request.path));
    }

    fn check_request_failure(&self, request: &RestRequest) -> ServerResult<()> {
        let query = request.query_param("q").unwrap_or_default();
        let mut failures = self.failures.lock();
        let rule = failures.rules.iter_mut().find(|rule| {
            rule.remaining != Some(0) && (request.path.contains(&rule.pattern) || query.contains(&rule.pattern))
        });
        let Some(rule) = rule else {
            return Ok(());
        };
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        let err = ServerError::Injected {
            status: rule.status,
            message: format!("request matching '{}' rejected", rule.pattern),
        };
        failures.rules.retain(|rule| rule.remaining != Some(0));
        Err(err)
    }

    fn check_record_failure(&self, id: &str) -> ServerResult<()> {
        match self.failures.lock().records.get(id) {
            Some(&status) => Err(ServerError::Injected {
                status,
                message: format!("record {id} rejected"),
            }),
            None => Ok(()),
        }
    }

    fn authorize(&self, request: &RestRequest) -> ServerResult<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let header = request
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("Authorization"))
            .map(|(_, value)| value.as_str());
        validator.validate_header(header).map(|_| ())
    }
}

/// Handler for REST requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one request. Errors are rendered as error responses.
    pub fn handle(&self, request: &RestRequest) -> RestResponse {
        self.context.record_request(request);
        let result = self
            .context
            .authorize(request)
            .and_then(|_| self.context.check_request_failure(request))
            .and_then(|_| self.route(request));
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_server_error() {
                    warn!(method = %request.method, path = %request.path, error = %e, "request failed");
                } else {
                    debug!(method = %request.method, path = %request.path, error = %e, "request rejected");
                }
                e.to_response()
            }
        };
        debug!(method = %request.method, path = %request.bare_path(), status = response.status, "handled request");
        response
    }

    fn segments<'r>(&self, request: &'r RestRequest) -> ServerResult<(&'r str, Vec<&'r str>)> {
        let unknown = || ServerError::UnknownEndpoint(request.bare_path().to_string());
        let rest = request
            .bare_path()
            .strip_prefix(SERVICES_DATA)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(unknown)?;
        let mut parts = rest.split('/').filter(|part| !part.is_empty());
        let version = parts.next().ok_or_else(unknown)?;
        if !self.context.config.supports_version(version) {
            return Err(unknown());
        }
        Ok((version, parts.collect()))
    }

    fn route(&self, request: &RestRequest) -> ServerResult<RestResponse> {
        let (version, segments) = self.segments(request)?;
        match (request.method, segments.as_slice()) {
            (RestMethod::Post, ["composite"]) => self.composite(request),
            (RestMethod::Get, _) => self.read(&self.context.objects.read(), version, request, &segments),
            _ => self.write(&mut self.context.objects.write(), request, &segments),
        }
    }

    fn read(
        &self,
        objects: &ObjectTable,
        version: &str,
        request: &RestRequest,
        segments: &[&str],
    ) -> ServerResult<RestResponse> {
        match segments {
            ["query"] => {
                let soql = request
                    .query_param("q")
                    .ok_or_else(|| ServerError::MalformedQuery("missing q parameter".into()))?;
                let rows = SoqlQuery::parse(&soql)?.execute(objects)?;
                Ok(self.first_page(version, rows, self.page_size(request)))
            }
            ["query", locator] => self.next_page(version, locator),
            ["search"] => {
                let sosl = request
                    .query_param("q")
                    .ok_or_else(|| ServerError::MalformedQuery("missing q parameter".into()))?;
                let rows = SoslSearch::parse(&sosl)?.execute(objects);
                Ok(RestResponse::ok(json!({ (names::SEARCH_RECORDS): rows })))
            }
            ["sobjects"] => {
                let sobjects: Vec<Value> = objects.types().into_iter().map(|name| json!({ "name": name })).collect();
                Ok(RestResponse::ok(json!({ "sobjects": sobjects })))
            }
            ["sobjects", object_type] => self.describe(objects, object_type),
            ["sobjects", object_type, id] => {
                self.context.check_record_failure(id)?;
                let record = objects.get(object_type, id)?;
                let body = match request.query_param("fields") {
                    Some(fields) => {
                        let fields: Vec<String> = fields
                            .split(',')
                            .map(|f| f.trim().to_string())
                            .filter(|f| !f.is_empty())
                            .collect();
                        project(record, &fields)
                    }
                    None => Value::Object(record.clone()),
                };
                Ok(RestResponse::ok(body))
            }
            _ => Err(ServerError::UnknownEndpoint(request.bare_path().to_string())),
        }
    }

    fn write(&self, objects: &mut ObjectTable, request: &RestRequest, segments: &[&str]) -> ServerResult<RestResponse> {
        match (request.method, segments) {
            (RestMethod::Post, ["sobjects", object_type]) => {
                let body = request
                    .body
                    .as_ref()
                    .ok_or_else(|| ServerError::InvalidRequest("create without body".into()))?;
                let id = objects.create(object_type, body)?;
                debug!(object_type, id = %id, "created record");
                Ok(RestResponse::created(json!({ "id": id, "success": true, "errors": [] })))
            }
            (RestMethod::Patch, ["sobjects", object_type, id]) => {
                self.context.check_record_failure(id)?;
                let body = request
                    .body
                    .as_ref()
                    .ok_or_else(|| ServerError::InvalidRequest("update without body".into()))?;
                objects.update(object_type, id, body)?;
                debug!(object_type, id, "updated record");
                Ok(RestResponse::no_content())
            }
            (RestMethod::Delete, ["sobjects", object_type, id]) => {
                self.context.check_record_failure(id)?;
                objects.delete(object_type, id)?;
                debug!(object_type, id, "deleted record");
                Ok(RestResponse::no_content())
            }
            (method, ["sobjects", ..] | ["query", ..] | ["search"] | ["composite"]) => {
                Err(ServerError::MethodNotAllowed(method.to_string()))
            }
            _ => Err(ServerError::UnknownEndpoint(request.bare_path().to_string())),
        }
    }

    fn describe(&self, objects: &ObjectTable, object_type: &str) -> ServerResult<RestResponse> {
        if !objects.has_type(object_type) {
            return Err(ServerError::UnknownObject(object_type.to_string()));
        }
        let fields = [names::ID.to_string(), names::NAME.to_string()];
        let recent: Vec<Value> = objects
            .recent_ids(object_type)
            .iter()
            .filter_map(|id| objects.get(object_type, id).ok())
            .map(|record| project(record, &fields))
            .collect();
        Ok(RestResponse::ok(json!({
            "objectDescribe": { "name": object_type, "label": object_type },
            (names::RECENT_ITEMS): recent,
        })))
    }

    fn page_size(&self, request: &RestRequest) -> usize {
        let requested = request
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(names::QUERY_OPTIONS_HEADER))
            .and_then(|(_, value)| {
                value.split(',').find_map(|option| {
                    let (key, size) = option.split_once('=')?;
                    (key.trim() == "batchSize").then(|| size.trim().parse().ok()).flatten()
                })
            });
        self.context.config.batch_size(requested)
    }

    fn first_page(&self, version: &str, rows: Vec<Value>, page_size: usize) -> RestResponse {
        let total_size = rows.len() as i64;
        if rows.len() <= page_size {
            let page = QueryResponse {
                records: rows,
                total_size,
                next_records_url: None,
            };
            return RestResponse::ok(page.to_json());
        }

        let key = Uuid::new_v4().to_string();
        let page = QueryResponse {
            records: rows[..page_size].to_vec(),
            total_size,
            next_records_url: Some(format!("{SERVICES_DATA}/{version}/query/{key}-{page_size}")),
        };
        self.context
            .cursors
            .lock()
            .insert(key, PendingQuery { rows, page_size });
        RestResponse::ok(page.to_json())
    }

    fn next_page(&self, version: &str, locator: &str) -> ServerResult<RestResponse> {
        let invalid = || ServerError::InvalidLocator(locator.to_string());
        let (key, offset) = locator.rsplit_once('-').ok_or_else(invalid)?;
        let offset: usize = offset.parse().map_err(|_| invalid())?;

        let mut cursors = self.context.cursors.lock();
        let pending = cursors.get(key).ok_or_else(invalid)?;
        if offset >= pending.rows.len() {
            return Err(invalid());
        }
        let end = (offset + pending.page_size).min(pending.rows.len());
        let next_records_url = (end < pending.rows.len()).then(|| format!("{SERVICES_DATA}/{version}/query/{key}-{end}"));
        let page = QueryResponse {
            records: pending.rows[offset..end].to_vec(),
            total_size: pending.rows.len() as i64,
            next_records_url,
        };
        if page.next_records_url.is_none() {
            // Last page served
            cursors.remove(key);
        }
        Ok(RestResponse::ok(page.to_json()))
    }

    fn composite(&self, request: &RestRequest) -> ServerResult<RestResponse> {
        let body = request
            .body
            .as_ref()
            .ok_or_else(|| ServerError::InvalidRequest("composite without body".into()))?;
        let all_or_none = body.get(names::ALL_OR_NONE).and_then(Value::as_bool).unwrap_or(false);
        let items = body
            .get(names::COMPOSITE_REQUEST)
            .and_then(Value::as_array)
            .ok_or_else(|| ServerError::InvalidRequest("composite without compositeRequest".into()))?;
        if items.is_empty() || items.len() > names::MAX_COMPOSITE_SUBREQUESTS {
            return Err(ServerError::InvalidRequest(format!(
                "composite calls take 1 to {} subrequests, got {}",
                names::MAX_COMPOSITE_SUBREQUESTS,
                items.len()
            )));
        }
        let subrequests = items
            .iter()
            .map(parse_subrequest)
            .collect::<ServerResult<Vec<_>>>()?;

        let mut objects = self.context.objects.write();
        let snapshot = all_or_none.then(|| objects.clone());
        let mut responses = Vec::with_capacity(subrequests.len());
        let mut first_failure = None;

        for (index, (reference_id, sub)) in subrequests.iter().enumerate() {
            let result = self
                .context
                .check_request_failure(sub)
                .and_then(|_| self.segments(sub))
                .and_then(|(version, segments)| match (sub.method, segments.as_slice()) {
                    (_, ["composite"]) => Err(ServerError::InvalidRequest("nested composite call".into())),
                    (RestMethod::Get, _) => self.read(&objects, version, sub, &segments),
                    _ => self.write(&mut objects, sub, &segments),
                });
            let response = result.unwrap_or_else(|e| e.to_response());
            if !response.is_success() && first_failure.is_none() {
                first_failure = Some(index);
            }
            responses.push(CompositeSubresponse {
                reference_id: reference_id.clone(),
                status: response.status,
                body: response.body.unwrap_or(Value::Null),
            });
        }

        if let (Some(snapshot), Some(failed)) = (snapshot, first_failure) {
            *objects = snapshot;
            for (index, response) in responses.iter_mut().enumerate() {
                if index != failed {
                    let halted = RestResponse::error(
                        400,
                        "PROCESSING_HALTED",
                        "The transaction was rolled back since another operation in the same transaction failed.",
                    );
                    response.status = halted.status;
                    response.body = halted.body.unwrap_or(Value::Null);
                }
            }
            debug!(failed, "composite call rolled back");
        }

        let body: Vec<Value> = responses.iter().map(CompositeSubresponse::to_json).collect();
        Ok(RestResponse::ok(json!({ (names::COMPOSITE_RESPONSE): body })))
    }
}

fn parse_subrequest(item: &Value) -> ServerResult<(String, RestRequest)> {
    let field = |name: &str| {
        item.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidRequest(format!("subrequest without {name}")))
    };
    let method = RestMethod::parse(field("method")?)
        .ok_or_else(|| ServerError::InvalidRequest("subrequest with unknown method".into()))?;
    let reference_id = field(names::REFERENCE_ID)?.to_string();
    let mut request = RestRequest::new(method, field("url")?);
    if let Some(body) = item.get("body").filter(|b| !b.is_null()) {
        request = request.with_body(body.clone());
    }
    Ok((reference_id, request))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> (RequestHandler, Arc<HandlerContext>) {
        let context = Arc::new(HandlerContext::new(ServerConfig::default().with_clock(0, 1000)));
        (RequestHandler::new(Arc::clone(&context)), context)
    }

    fn create(handler: &RequestHandler, name: &str) -> String {
        let response = handler.handle(&RestRequest::for_create("v60.0", "Account", json!({ "Name": name })).unwrap());
        assert_eq!(response.status, 201);
        response.as_json()["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn crud_round() {
        let (handler, _) = handler();
        let id = create(&handler, "Acme");

        let fields = vec!["Name".to_string()];
        let response = handler.handle(&RestRequest::for_retrieve("v60.0", "Account", &id, &fields).unwrap());
        assert_eq!(response.status, 200);
        assert_eq!(response.as_json()["Name"], "Acme");
        assert!(response.as_json().get("LastModifiedDate").is_none());

        let response = handler.handle(&RestRequest::for_update("v60.0", "Account", &id, json!({"Name": "Acme 2"})).unwrap());
        assert_eq!(response.status, 204);

        let response = handler.handle(&RestRequest::for_retrieve("v60.0", "Account", &id, &[]).unwrap());
        assert_eq!(response.as_json()["Name"], "Acme 2");
        assert_eq!(response.as_json()["LastModifiedDate"], "1970-01-01T00:00:02.000+0000");

        assert_eq!(handler.handle(&RestRequest::for_delete("v60.0", "Account", &id).unwrap()).status, 204);
        let again = handler.handle(&RestRequest::for_delete("v60.0", "Account", &id).unwrap());
        assert_eq!(again.status, 404);
        assert_eq!(again.as_json()[0]["errorCode"], "NOT_FOUND");
    }

    #[test]
    fn query_pages_follow_batch_size() {
        let (handler, context) = handler();
        for i in 0..5 {
            create(&handler, &format!("A{i}"));
        }
        let request = RestRequest::for_query("v60.0", "select Id, Name from Account")
            .unwrap()
            .with_header(names::QUERY_OPTIONS_HEADER, "batchSize=2");

        let mut page = QueryResponse::from_json(handler.handle(&request).as_json()).unwrap();
        let mut names = Vec::new();
        let mut last_url = None;
        loop {
            assert_eq!(page.total_size, 5);
            names.extend(page.records.iter().map(|r| r["Name"].as_str().unwrap().to_string()));
            let Some(next) = page.next_records_url.clone() else { break };
            assert_eq!(context.open_cursors(), 1);
            let response = handler.handle(&RestRequest::for_query_more(&next).unwrap());
            page = QueryResponse::from_json(response.as_json()).unwrap();
            last_url = Some(next);
        }
        assert_eq!(names, vec!["A0", "A1", "A2", "A3", "A4"]);

        // The cursor is gone once its last page was served
        assert_eq!(context.open_cursors(), 0);
        let last_url = last_url.unwrap();
        let again = handler.handle(&RestRequest::for_query_more(&last_url).unwrap());
        assert_eq!(again.status, 400);
        assert_eq!(again.as_json()[0]["errorCode"], "INVALID_QUERY_LOCATOR");
    }

    #[test]
    fn unknown_locator_and_version() {
        let (handler, _) = handler();
        let response = handler.handle(&RestRequest::new(RestMethod::Get, "/services/data/v60.0/query/abc-2"));
        assert_eq!(response.status, 400);
        assert_eq!(response.as_json()[0]["errorCode"], "INVALID_QUERY_LOCATOR");

        let response = handler.handle(&RestRequest::new(RestMethod::Get, "/services/data/v1.0/sobjects"));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn metadata_lists_recent_items() {
        let (handler, context) = handler();
        let first = create(&handler, "First");
        let second = create(&handler, "Second");
        context.objects.write().touch_recent("Account", &first);

        let response = handler.handle(&RestRequest::for_metadata("v60.0", "Account").unwrap());
        let ids = smartsync_protocol::recent_item_ids(response.as_json(), "Id").unwrap();
        assert_eq!(ids, vec![first, second]);

        let unknown = handler.handle(&RestRequest::for_metadata("v60.0", "Widget__c").unwrap());
        assert_eq!(unknown.status, 404);
    }

    #[test]
    fn search_endpoint() {
        let (handler, _) = handler();
        create(&handler, "Acme");
        create(&handler, "Globex");
        let response = handler.handle(
            &RestRequest::for_search("v60.0", "find {acme} in all fields returning Account(Id, Name)").unwrap(),
        );
        let rows = smartsync_protocol::search_records(response.as_json()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Name"], "Acme");
    }

    #[test]
    fn injected_failures() {
        let (handler, context) = handler();
        let id = create(&handler, "Acme");

        context.fail_requests_matching("from Account", 503, Some(1));
        let query = RestRequest::for_query("v60.0", "select Id from Account").unwrap();
        assert_eq!(handler.handle(&query).status, 503);
        assert_eq!(handler.handle(&query).status, 200);

        context.fail_record(&id, 400);
        let update = RestRequest::for_update("v60.0", "Account", &id, json!({"Name": "x"})).unwrap();
        assert_eq!(handler.handle(&update).status, 400);
        context.clear_failures();
        assert_eq!(handler.handle(&update).status, 204);
        assert_eq!(context.request_count(), 5);
        assert!(context.request_log()[0].starts_with("POST /services/data/v60.0/sobjects/Account"));
    }

    #[test]
    fn composite_reports_each_subrequest() {
        let (handler, context) = handler();
        let id = create(&handler, "Acme");
        context.fail_record(&id, 400);

        let subrequests = vec![
            smartsync_protocol::CompositeSubrequest::from_request(
                RestRequest::for_create("v60.0", "Account", json!({"Name": "New"})).unwrap(),
                "ref0",
            ),
            smartsync_protocol::CompositeSubrequest::from_request(
                RestRequest::for_update("v60.0", "Account", &id, json!({"Name": "Changed"})).unwrap(),
                "ref1",
            ),
        ];
        let response = handler.handle(&RestRequest::for_composite("v60.0", false, &subrequests).unwrap());
        let subresponses = CompositeSubresponse::list_from_json(response.as_json()).unwrap();
        assert_eq!(subresponses[0].status, 201);
        assert_eq!(subresponses[1].status, 400);
        assert_eq!(context.objects.read().count("Account"), 2);

        let response = handler.handle(&RestRequest::for_composite("v60.0", true, &subrequests).unwrap());
        let subresponses = CompositeSubresponse::list_from_json(response.as_json()).unwrap();
        assert_eq!(subresponses[0].status, 400);
        assert_eq!(subresponses[0].body[0]["errorCode"], "PROCESSING_HALTED");
        assert_eq!(context.objects.read().count("Account"), 2);
    }

    #[test]
    fn auth_required_when_configured() {
        let config = ServerConfig::default().with_auth(b"secret".to_vec());
        let context = Arc::new(HandlerContext::new(config));
        let handler = RequestHandler::new(Arc::clone(&context));

        let request = RestRequest::new(RestMethod::Get, "/services/data/v60.0/sobjects");
        let response = handler.handle(&request);
        assert_eq!(response.status, 401);
        assert_eq!(response.as_json()[0]["errorCode"], "INVALID_SESSION_ID");

        let token = context.create_token("user").unwrap();
        let response = handler.handle(&request.with_header("authorization", format!("Bearer {token}")));
        assert_eq!(response.status, 200);
    }
}
