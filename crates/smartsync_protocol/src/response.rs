//! REST responses and decoders for the bodies the sync engine reads.

use crate::error::{ProtocolError, ProtocolResult};
use crate::names;
use serde_json::{json, Value};

/// A REST response: status code plus optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body; `None` for empty bodies (e.g. 204).
    pub body: Option<Value>,
}

impl RestResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    /// 200 with a JSON body.
    pub fn ok(body: Value) -> Self {
        Self::new(200, Some(body))
    }

    /// 201 with a JSON body.
    pub fn created(body: Value) -> Self {
        Self::new(201, Some(body))
    }

    /// 204 without body.
    pub fn no_content() -> Self {
        Self::new(204, None)
    }

    /// An error response with a `[{"message", "errorCode"}]` body.
    pub fn error(status: u16, error_code: &str, message: &str) -> Self {
        Self::new(
            status,
            Some(json!([{ (names::MESSAGE): message, (names::ERROR_CODE): error_code }])),
        )
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body, or `Null` when empty.
    pub fn as_json(&self) -> &Value {
        static NULL: Value = Value::Null;
        self.body.as_ref().unwrap_or(&NULL)
    }

    /// Builds a human readable message for a failed response.
    ///
    /// Uses the first `message` of an error array when present.
    pub fn error_message(&self) -> String {
        let first = match self.as_json() {
            Value::Array(items) => items.first(),
            other => Some(other),
        };
        first
            .and_then(|item| item.get(names::MESSAGE))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }

    /// Parses a raw body. Empty input yields `None`.
    pub fn parse_body(bytes: &[u8]) -> ProtocolResult<Option<Value>> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(bytes)?))
    }
}

/// One page of a query response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResponse {
    /// Records of this page.
    pub records: Vec<Value>,
    /// Total number of records across all pages.
    pub total_size: i64,
    /// Url of the next page, if any.
    pub next_records_url: Option<String>,
}

impl QueryResponse {
    /// Decodes a `{"totalSize", "done", "records", "nextRecordsUrl"}` body.
    pub fn from_json(body: &Value) -> ProtocolResult<Self> {
        let records = body
            .get(names::RECORDS)
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| ProtocolError::invalid_response("query response without records"))?;
        let total_size = body
            .get(names::TOTAL_SIZE)
            .and_then(Value::as_i64)
            .unwrap_or(records.len() as i64);
        let next_records_url = body
            .get(names::NEXT_RECORDS_URL)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        Ok(Self {
            records,
            total_size,
            next_records_url,
        })
    }

    /// Encodes the page the way the server renders it.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            (names::TOTAL_SIZE): self.total_size,
            (names::DONE): self.next_records_url.is_none(),
            (names::RECORDS): self.records,
        });
        if let Some(url) = &self.next_records_url {
            body[names::NEXT_RECORDS_URL] = Value::from(url.clone());
        }
        body
    }
}

/// Decodes the records of a search response.
///
/// Accepts both `{"searchRecords": [...]}` and a bare array.
pub fn search_records(body: &Value) -> ProtocolResult<Vec<Value>> {
    match body {
        Value::Array(records) => Ok(records.clone()),
        Value::Object(map) => map
            .get(names::SEARCH_RECORDS)
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| ProtocolError::invalid_response("search response without searchRecords")),
        _ => Err(ProtocolError::invalid_response("search response is not an object")),
    }
}

/// Decodes the recent item ids of a metadata response.
pub fn recent_item_ids(body: &Value, id_field_name: &str) -> ProtocolResult<Vec<String>> {
    let items = body
        .get(names::RECENT_ITEMS)
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::invalid_response("metadata response without recentItems"))?;
    Ok(items
        .iter()
        .filter_map(|item| item.get(id_field_name).and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// One subresponse of a composite call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSubresponse {
    /// Reference id of the matching subrequest.
    pub reference_id: String,
    /// HTTP status of the subrequest.
    pub status: u16,
    /// Body of the subrequest.
    pub body: Value,
}

impl CompositeSubresponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Views the subresponse as a plain response.
    pub fn as_response(&self) -> RestResponse {
        let body = (!self.body.is_null()).then(|| self.body.clone());
        RestResponse::new(self.status, body)
    }

    /// Decodes a `{"compositeResponse": [...]}` body.
    pub fn list_from_json(body: &Value) -> ProtocolResult<Vec<Self>> {
        let items = body
            .get(names::COMPOSITE_RESPONSE)
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::invalid_response("missing compositeResponse"))?;
        items
            .iter()
            .map(|item| {
                let reference_id = item
                    .get(names::REFERENCE_ID)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProtocolError::invalid_response("subresponse without referenceId"))?;
                let status = item
                    .get(names::HTTP_STATUS_CODE)
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok())
                    .ok_or_else(|| ProtocolError::invalid_response("subresponse without status"))?;
                Ok(Self {
                    reference_id: reference_id.to_string(),
                    status,
                    body: item.get("body").cloned().unwrap_or(Value::Null),
                })
            })
            .collect()
    }

    /// Encodes the subresponse the way the server renders it.
    pub fn to_json(&self) -> Value {
        json!({
            (names::REFERENCE_ID): self.reference_id,
            (names::HTTP_STATUS_CODE): self.status,
            "httpHeaders": {},
            "body": self.body,
        })
    }
}
