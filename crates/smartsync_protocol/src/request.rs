//! REST requests and their factories.

use crate::error::{ProtocolError, ProtocolResult};
use crate::names;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Root of every data endpoint.
pub const SERVICES_DATA: &str = "/services/data";

/// HTTP method of a REST request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl RestMethod {
    /// Returns the method as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Patch => "PATCH",
            RestMethod::Delete => "DELETE",
        }
    }

    /// Whether sending the request twice leaves the server as sending it
    /// once. POST creates a record each time it lands.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, RestMethod::Post)
    }

    /// Parses a wire method name (case-insensitive).
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_uppercase().as_str() {
            "GET" => Some(RestMethod::Get),
            "POST" => Some(RestMethod::Post),
            "PATCH" => Some(RestMethod::Patch),
            "DELETE" => Some(RestMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A REST request relative to the instance url.
///
/// `path` carries the query string, already percent-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    /// HTTP method.
    pub method: RestMethod,
    /// Path plus optional query string, e.g. `/services/data/v60.0/query?q=...`.
    pub path: String,
    /// JSON body.
    pub body: Option<Value>,
    /// Extra headers.
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout; `None` leaves it to the client.
    pub timeout: Option<Duration>,
}

/// One subrequest of a composite call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSubrequest {
    /// HTTP method.
    pub method: RestMethod,
    /// Path of the subrequest.
    pub url: String,
    /// Reference id echoed back in the matching subresponse.
    pub reference_id: String,
    /// JSON body.
    pub body: Option<Value>,
}

impl CompositeSubrequest {
    /// Wraps a plain request as a composite subrequest.
    pub fn from_request(request: RestRequest, reference_id: impl Into<String>) -> Self {
        Self {
            method: request.method,
            url: request.path,
            reference_id: reference_id.into(),
            body: request.body,
        }
    }

    fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("method".into(), Value::from(self.method.as_str()));
        map.insert("url".into(), Value::from(self.url.clone()));
        map.insert(names::REFERENCE_ID.into(), Value::from(self.reference_id.clone()));
        if let Some(body) = &self.body {
            map.insert("body".into(), body.clone());
        }
        Value::Object(map)
    }
}

fn versioned(api_version: &str, rest: &str) -> String {
    format!("{SERVICES_DATA}/{api_version}/{rest}")
}

fn require(value: &str, what: &str) -> ProtocolResult<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::invalid_request(format!("{what} must not be empty")));
    }
    Ok(())
}

impl RestRequest {
    /// Creates a request without body or headers.
    pub fn new(method: RestMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs a SOQL query.
    pub fn for_query(api_version: &str, soql: &str) -> ProtocolResult<Self> {
        require(soql, "query")?;
        let path = versioned(api_version, &format!("query?q={}", urlencoding::encode(soql)));
        Ok(Self::new(RestMethod::Get, path))
    }

    /// Fetches the next page of a query from its `nextRecordsUrl`.
    pub fn for_query_more(next_records_url: &str) -> ProtocolResult<Self> {
        require(next_records_url, "next records url")?;
        Ok(Self::new(RestMethod::Get, next_records_url))
    }

    /// Runs a SOSL search.
    pub fn for_search(api_version: &str, sosl: &str) -> ProtocolResult<Self> {
        require(sosl, "search")?;
        let path = versioned(api_version, &format!("search?q={}", urlencoding::encode(sosl)));
        Ok(Self::new(RestMethod::Get, path))
    }

    /// Creates a record of `object_type`.
    pub fn for_create(api_version: &str, object_type: &str, fields: Value) -> ProtocolResult<Self> {
        require(object_type, "object type")?;
        let path = versioned(api_version, &format!("sobjects/{object_type}"));
        Ok(Self::new(RestMethod::Post, path).with_body(fields))
    }

    /// Retrieves selected fields of one record.
    pub fn for_retrieve(
        api_version: &str,
        object_type: &str,
        id: &str,
        field_list: &[String],
    ) -> ProtocolResult<Self> {
        require(object_type, "object type")?;
        require(id, "record id")?;
        let mut path = versioned(api_version, &format!("sobjects/{object_type}/{id}"));
        if !field_list.is_empty() {
            path.push_str("?fields=");
            path.push_str(&urlencoding::encode(&field_list.join(",")));
        }
        Ok(Self::new(RestMethod::Get, path))
    }

    /// Updates a record.
    pub fn for_update(
        api_version: &str,
        object_type: &str,
        id: &str,
        fields: Value,
    ) -> ProtocolResult<Self> {
        require(object_type, "object type")?;
        require(id, "record id")?;
        let path = versioned(api_version, &format!("sobjects/{object_type}/{id}"));
        Ok(Self::new(RestMethod::Patch, path).with_body(fields))
    }

    /// Deletes a record.
    pub fn for_delete(api_version: &str, object_type: &str, id: &str) -> ProtocolResult<Self> {
        require(object_type, "object type")?;
        require(id, "record id")?;
        let path = versioned(api_version, &format!("sobjects/{object_type}/{id}"));
        Ok(Self::new(RestMethod::Delete, path))
    }

    /// Object metadata including the recently viewed items of that type.
    pub fn for_metadata(api_version: &str, object_type: &str) -> ProtocolResult<Self> {
        require(object_type, "object type")?;
        let path = versioned(api_version, &format!("sobjects/{object_type}"));
        Ok(Self::new(RestMethod::Get, path))
    }

    /// Runs several subrequests in one round trip.
    ///
    /// At most [`names::MAX_COMPOSITE_SUBREQUESTS`] subrequests are allowed.
    pub fn for_composite(
        api_version: &str,
        all_or_none: bool,
        subrequests: &[CompositeSubrequest],
    ) -> ProtocolResult<Self> {
        if subrequests.is_empty() {
            return Err(ProtocolError::invalid_request("composite call without subrequests"));
        }
        if subrequests.len() > names::MAX_COMPOSITE_SUBREQUESTS {
            return Err(ProtocolError::invalid_request(format!(
                "composite call with {} subrequests exceeds {}",
                subrequests.len(),
                names::MAX_COMPOSITE_SUBREQUESTS
            )));
        }
        let body = json!({
            (names::ALL_OR_NONE): all_or_none,
            (names::COMPOSITE_REQUEST): subrequests
                .iter()
                .map(CompositeSubrequest::to_json)
                .collect::<Vec<_>>(),
        });
        let path = versioned(api_version, "composite");
        Ok(Self::new(RestMethod::Post, path).with_body(body))
    }

    /// Returns the decoded value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let (_, query) = self.path.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key != name {
                return None;
            }
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        })
    }

    /// Returns the path without its query string.
    pub fn bare_path(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_url_encoded() {
        let request = RestRequest::for_query("v60.0", "select Id from Account where Name = 'A&B'")
            .unwrap();
        assert_eq!(request.method, RestMethod::Get);
        assert!(request.path.starts_with("/services/data/v60.0/query?q=select%20Id"));
        assert!(!request.path.contains('&'));
        assert_eq!(
            request.query_param("q").as_deref(),
            Some("select Id from Account where Name = 'A&B'")
        );
        assert_eq!(request.bare_path(), "/services/data/v60.0/query");
    }

    #[test]
    fn sobject_paths() {
        let create = RestRequest::for_create("v60.0", "Account", json!({"Name": "Acme"})).unwrap();
        assert_eq!(create.method, RestMethod::Post);
        assert_eq!(create.path, "/services/data/v60.0/sobjects/Account");
        assert_eq!(create.body, Some(json!({"Name": "Acme"})));

        let update = RestRequest::for_update("v60.0", "Account", "001", json!({})).unwrap();
        assert_eq!(update.method, RestMethod::Patch);
        assert_eq!(update.path, "/services/data/v60.0/sobjects/Account/001");

        let delete = RestRequest::for_delete("v60.0", "Account", "001").unwrap();
        assert_eq!(delete.method, RestMethod::Delete);
        assert!(delete.body.is_none());

        let retrieve = RestRequest::for_retrieve(
            "v60.0",
            "Account",
            "001",
            &["Id".to_string(), "LastModifiedDate".to_string()],
        )
        .unwrap();
        assert_eq!(retrieve.query_param("fields").as_deref(), Some("Id,LastModifiedDate"));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(RestRequest::for_query("v60.0", " ").is_err());
        assert!(RestRequest::for_delete("v60.0", "Account", "").is_err());
        assert!(RestRequest::for_metadata("v60.0", "").is_err());
        assert!(RestRequest::for_query_more("").is_err());
    }

    #[test]
    fn composite_body_shape() {
        let sub = CompositeSubrequest::from_request(
            RestRequest::for_delete("v60.0", "Account", "001").unwrap(),
            "ref0",
        );
        let request = RestRequest::for_composite("v60.0", false, &[sub]).unwrap();
        let body = request.body.unwrap();
        assert_eq!(body["allOrNone"], false);
        assert_eq!(body["compositeRequest"][0]["method"], "DELETE");
        assert_eq!(body["compositeRequest"][0]["referenceId"], "ref0");
        assert!(body["compositeRequest"][0].get("body").is_none());
    }

    #[test]
    fn composite_limits() {
        assert!(RestRequest::for_composite("v60.0", false, &[]).is_err());

        let subs: Vec<_> = (0..26)
            .map(|i| CompositeSubrequest {
                method: RestMethod::Get,
                url: "/x".into(),
                reference_id: format!("ref{i}"),
                body: None,
            })
            .collect();
        assert!(RestRequest::for_composite("v60.0", false, &subs).is_err());
        assert!(RestRequest::for_composite("v60.0", false, &subs[..25]).is_ok());
    }

    #[test]
    fn method_parse() {
        assert_eq!(RestMethod::parse("patch"), Some(RestMethod::Patch));
        assert_eq!(RestMethod::parse("PUT"), None);
        assert_eq!(RestMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn only_post_is_not_idempotent() {
        assert!(RestMethod::Get.is_idempotent());
        assert!(RestMethod::Patch.is_idempotent());
        assert!(RestMethod::Delete.is_idempotent());
        assert!(!RestMethod::Post.is_idempotent());
    }
}
