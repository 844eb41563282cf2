//! Local change flags carried by records in a synced soup.

use serde_json::Value;
use smartsync_store::project;

/// True when the record has local changes not yet on the server.
pub const LOCAL: &str = "__local__";
/// True when the record was created locally.
pub const LOCALLY_CREATED: &str = "__locally_created__";
/// True when the record was updated locally.
pub const LOCALLY_UPDATED: &str = "__locally_updated__";
/// True when the record was deleted locally.
pub const LOCALLY_DELETED: &str = "__locally_deleted__";
/// Message of the last failed or conflicting sync up of the record.
pub const LAST_ERROR: &str = "__last_error__";

/// Prefix of ids given to records created locally.
pub const LOCAL_ID_PREFIX: &str = "local_";

fn flag(record: &Value, name: &str) -> bool {
    record.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn set(record: &mut Value, name: &str, value: Value) {
    if let Some(map) = record.as_object_mut() {
        map.insert(name.to_string(), value);
    }
}

/// Returns a fresh placeholder id for a record created locally.
pub fn new_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Returns true if `id` is a placeholder from [`new_local_id`].
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// Returns true if the record has unsynced local changes.
pub fn is_dirty(record: &Value) -> bool {
    flag(record, LOCAL)
}

/// Returns true if the record was created locally.
pub fn is_locally_created(record: &Value) -> bool {
    flag(record, LOCALLY_CREATED)
}

/// Returns true if the record was updated locally.
pub fn is_locally_updated(record: &Value) -> bool {
    flag(record, LOCALLY_UPDATED)
}

/// Returns true if the record was deleted locally.
pub fn is_locally_deleted(record: &Value) -> bool {
    flag(record, LOCALLY_DELETED)
}

/// Marks a record as created locally.
pub fn mark_locally_created(record: &mut Value) {
    set(record, LOCAL, Value::Bool(true));
    set(record, LOCALLY_CREATED, Value::Bool(true));
}

/// Marks a record as updated locally.
pub fn mark_locally_updated(record: &mut Value) {
    set(record, LOCAL, Value::Bool(true));
    set(record, LOCALLY_UPDATED, Value::Bool(true));
}

/// Marks a record as deleted locally.
pub fn mark_locally_deleted(record: &mut Value) {
    set(record, LOCAL, Value::Bool(true));
    set(record, LOCALLY_DELETED, Value::Bool(true));
}

/// Clears every local change flag and the last error.
pub fn clean(record: &mut Value) {
    for name in [LOCAL, LOCALLY_CREATED, LOCALLY_UPDATED, LOCALLY_DELETED] {
        set(record, name, Value::Bool(false));
    }
    if let Some(map) = record.as_object_mut() {
        map.remove(LAST_ERROR);
    }
}

/// Attaches an error message to a record, leaving its flags as they are.
pub fn set_last_error(record: &mut Value, message: &str) {
    set(record, LAST_ERROR, Value::from(message));
}

/// Returns the last error attached to a record.
pub fn last_error(record: &Value) -> Option<&str> {
    record.get(LAST_ERROR).and_then(Value::as_str)
}

/// Returns the server object type from `attributes.type`.
pub fn object_type(record: &Value) -> Option<&str> {
    project(record, smartsync_protocol::names::ATTRIBUTES_TYPE)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
}

/// Server operation needed to push a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Create on the server.
    Create,
    /// Update on the server.
    Update,
    /// Delete on the server.
    Delete,
    /// Nothing to push.
    None,
}

impl SyncAction {
    /// Picks the action from the record's flags: delete, then create, then update.
    pub fn for_record(record: &Value) -> Self {
        if is_locally_deleted(record) {
            SyncAction::Delete
        } else if is_locally_created(record) {
            SyncAction::Create
        } else if is_locally_updated(record) {
            SyncAction::Update
        } else {
            SyncAction::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_precedence() {
        let mut record = json!({"Name": "Acme"});
        assert_eq!(SyncAction::for_record(&record), SyncAction::None);

        mark_locally_updated(&mut record);
        assert_eq!(SyncAction::for_record(&record), SyncAction::Update);

        mark_locally_created(&mut record);
        assert_eq!(SyncAction::for_record(&record), SyncAction::Create);

        mark_locally_deleted(&mut record);
        assert_eq!(SyncAction::for_record(&record), SyncAction::Delete);
        assert!(is_dirty(&record));
    }

    #[test]
    fn clean_resets_flags_and_error() {
        let mut record = json!({"Name": "Acme"});
        mark_locally_created(&mut record);
        set_last_error(&mut record, "boom");
        assert_eq!(last_error(&record), Some("boom"));

        clean(&mut record);
        assert!(!is_dirty(&record));
        assert!(!is_locally_created(&record));
        assert_eq!(record[LOCALLY_DELETED], false);
        assert_eq!(last_error(&record), None);
    }

    #[test]
    fn local_ids() {
        let a = new_local_id();
        let b = new_local_id();
        assert_ne!(a, b);
        assert!(is_local_id(&a));
        assert!(!is_local_id("001000000000001"));
    }

    #[test]
    fn object_type_from_attributes() {
        assert_eq!(object_type(&json!({"attributes": {"type": "Account"}})), Some("Account"));
        assert_eq!(object_type(&json!({"attributes": {"type": ""}})), None);
        assert_eq!(object_type(&json!({})), None);
    }
}
