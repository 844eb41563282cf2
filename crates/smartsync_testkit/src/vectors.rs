//! Persisted-format test vectors for SmartSync.
//!
//! Sync states written by other clients of the same store must decode
//! here, so their key names and enum strings are pinned as vectors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A persisted sync state and whether it must decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// The stored JSON.
    pub json: Value,
    /// Substring of the expected error (if this should fail).
    pub expected_error: Option<String>,
}

/// A resync filter insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncFilterVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Original query.
    pub query: String,
    /// Modification date field.
    pub field: String,
    /// Time stamp checkpoint in epoch milliseconds.
    pub max_time_stamp: i64,
    /// Query after insertion.
    pub expected: String,
}

/// A server timestamp and its epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampVector {
    /// Timestamp text.
    pub text: String,
    /// Expected milliseconds, or `None` if the text must be rejected.
    pub millis: Option<i64>,
}

fn state_vector(id: &str, description: &str, json: Value, expected_error: Option<&str>) -> StateVector {
    StateVector {
        id: id.into(),
        description: description.into(),
        json,
        expected_error: expected_error.map(str::to_string),
    }
}

/// Persisted sync state vectors.
pub fn sync_state_vectors() -> Vec<StateVector> {
    vec![
        state_vector(
            "soql_done",
            "Finished SOQL sync down with a checkpoint",
            json!({
                "_soupEntryId": 3,
                "type": "SyncDown",
                "target": {
                    "type": "soql",
                    "query": "select Id, Name, LastModifiedDate from Account",
                    "idFieldName": "Id",
                    "modificationDateFieldName": "LastModifiedDate"
                },
                "options": {"fieldlist": [], "mergeMode": "Overwrite"},
                "soupName": "accounts",
                "status": "Done",
                "progress": 100,
                "totalSize": 80,
                "maxTimeStamp": 1_704_067_280_000i64
            }),
            None,
        ),
        state_vector(
            "mru_failed",
            "Failed MRU sync down keeping its error",
            json!({
                "_soupEntryId": 4,
                "type": "SyncDown",
                "target": {"type": "mru", "sobjectType": "Contact", "fieldlist": ["Id", "LastName"]},
                "options": {"mergeMode": "LeaveIfChanged"},
                "soupName": "contacts",
                "status": "Failed",
                "progress": 42,
                "totalSize": 12,
                "maxTimeStamp": -1,
                "error": "http 503: unavailable"
            }),
            None,
        ),
        state_vector(
            "composite_new",
            "New composite sync up with a field list",
            json!({
                "_soupEntryId": 5,
                "type": "SyncUp",
                "target": {"type": "composite", "maxBatchSize": 10},
                "options": {"fieldlist": ["Name", "Industry"]},
                "soupName": "accounts",
                "status": "New",
                "progress": 0,
                "totalSize": -1,
                "maxTimeStamp": -1
            }),
            None,
        ),
        state_vector(
            "up_without_target_type",
            "Sync up target without a type defaults to rest",
            json!({
                "_soupEntryId": 6,
                "type": "SyncUp",
                "target": {},
                "options": {},
                "soupName": "accounts",
                "status": "Done",
                "progress": 100,
                "totalSize": 3,
                "maxTimeStamp": -1
            }),
            None,
        ),
        state_vector(
            "unknown_status",
            "Status strings are case sensitive",
            json!({
                "_soupEntryId": 7,
                "type": "SyncDown",
                "target": {"type": "soql", "query": "select Id from Account"},
                "soupName": "accounts",
                "status": "DONE",
                "progress": 100,
                "totalSize": 0,
                "maxTimeStamp": -1
            }),
            Some("unknown status"),
        ),
        state_vector(
            "progress_out_of_range",
            "Progress above 100 is rejected",
            json!({
                "_soupEntryId": 8,
                "type": "SyncDown",
                "target": {"type": "soql", "query": "select Id from Account"},
                "soupName": "accounts",
                "status": "Running",
                "progress": 140,
                "totalSize": 10,
                "maxTimeStamp": -1
            }),
            Some("progress out of range"),
        ),
        state_vector(
            "unknown_merge_mode",
            "Merge mode names are exact",
            json!({
                "_soupEntryId": 9,
                "type": "SyncDown",
                "target": {"type": "soql", "query": "select Id from Account"},
                "options": {"mergeMode": "overwrite"},
                "soupName": "accounts",
                "status": "New",
                "progress": 0,
                "totalSize": -1,
                "maxTimeStamp": -1
            }),
            Some("unknown merge mode"),
        ),
        state_vector(
            "unknown_target",
            "Unknown sync down target types are rejected",
            json!({
                "_soupEntryId": 10,
                "type": "SyncDown",
                "target": {"type": "layout"},
                "soupName": "accounts",
                "status": "New",
                "progress": 0,
                "totalSize": -1,
                "maxTimeStamp": -1
            }),
            Some("unknown down target type"),
        ),
    ]
}

/// Resync filter vectors.
pub fn resync_filter_vectors() -> Vec<ResyncFilterVector> {
    let vector = |id: &str, query: &str, field: &str, max_time_stamp: i64, expected: &str| ResyncFilterVector {
        id: id.into(),
        query: query.into(),
        field: field.into(),
        max_time_stamp,
        expected: expected.into(),
    };
    vec![
        vector(
            "no_where",
            "select Id from Account",
            "LastModifiedDate",
            1_704_067_200_000,
            "select Id from Account where LastModifiedDate > 2024-01-01T00:00:00.000Z",
        ),
        vector(
            "existing_where",
            "select Id from Account where Name like 'A%' limit 5",
            "LastModifiedDate",
            1_704_067_201_500,
            "select Id from Account where LastModifiedDate > 2024-01-01T00:00:01.500Z and (Name like 'A%') limit 5",
        ),
        vector(
            "or_predicate",
            "select Id from Account\nwhere Industry = 'Retail'\n   or Industry = 'Media'",
            "LastModifiedDate",
            1_704_067_200_000,
            "select Id from Account\nwhere LastModifiedDate > 2024-01-01T00:00:00.000Z and (Industry = 'Retail'\n   or Industry = 'Media')",
        ),
        vector(
            "order_by_tail",
            "SELECT Id FROM Contact ORDER BY LastName",
            "SystemModstamp",
            1000,
            "SELECT Id FROM Contact where SystemModstamp > 1970-01-01T00:00:01.000Z ORDER BY LastName",
        ),
        vector(
            "no_checkpoint",
            "select Id from Account",
            "LastModifiedDate",
            -1,
            "select Id from Account",
        ),
    ]
}

/// Server timestamp vectors.
pub fn timestamp_vectors() -> Vec<TimestampVector> {
    let vector = |text: &str, millis: Option<i64>| TimestampVector {
        text: text.into(),
        millis,
    };
    vec![
        vector("2024-01-01T00:00:00.000+0000", Some(1_704_067_200_000)),
        vector("2024-01-01T00:00:00.250Z", Some(1_704_067_200_250)),
        vector("2024-01-01T02:00:00.000+0200", Some(1_704_067_200_000)),
        vector("1970-01-01T00:00:00.000+0000", Some(0)),
        vector("2024-02-30T00:00:00.000+0000", None),
        vector("01/01/2024", None),
        vector("", None),
    ]
}
