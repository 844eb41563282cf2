//! In-memory server-side records.
//!
//! Records are kept per object type, ordered by id. Every write stamps
//! `LastModifiedDate` and `SystemModstamp` from a logical clock that
//! advances a fixed step per write, so tests control time completely.

use crate::error::{ServerError, ServerResult};
use serde_json::{Map, Value};
use smartsync_protocol::{names, timestamp, SERVICES_DATA};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Fields the server owns; client writes to them are ignored.
const SYSTEM_FIELDS: [&str; 5] = [
    names::ID,
    names::ATTRIBUTES,
    "CreatedDate",
    names::LAST_MODIFIED_DATE,
    names::SYSTEM_MODSTAMP,
];

/// Returns the three character id prefix of an object type.
fn key_prefix(object_type: &str) -> String {
    match object_type {
        "Account" => "001".into(),
        "Contact" => "003".into(),
        "Opportunity" => "006".into(),
        "Lead" => "00Q".into(),
        other => {
            let sum: u32 = other.bytes().map(u32::from).sum();
            format!("a{:02}", sum % 100)
        }
    }
}

/// All records held by the server plus the logical clock.
#[derive(Debug, Clone)]
pub struct ObjectTable {
    api_version: String,
    objects: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
    recent: HashMap<String, VecDeque<String>>,
    max_recent_items: usize,
    clock: i64,
    clock_step: i64,
    next_id: u64,
}

impl ObjectTable {
    /// Creates an empty table.
    pub fn new(api_version: impl Into<String>, clock_start: i64, clock_step: i64, max_recent_items: usize) -> Self {
        Self {
            api_version: api_version.into(),
            objects: BTreeMap::new(),
            recent: HashMap::new(),
            max_recent_items,
            clock: clock_start,
            clock_step: clock_step.max(1),
            next_id: 1,
        }
    }

    /// Current logical time in epoch milliseconds.
    pub fn now(&self) -> i64 {
        self.clock
    }

    /// Moves the logical clock forward.
    pub fn advance_clock(&mut self, millis: i64) {
        self.clock += millis.max(0);
    }

    fn tick(&mut self) -> i64 {
        self.clock += self.clock_step;
        self.clock
    }

    fn new_id(&mut self, object_type: &str) -> String {
        let id = format!("{}{:015}", key_prefix(object_type), self.next_id);
        self.next_id += 1;
        id
    }

    fn stamp(&mut self, object_type: &str, id: &str, record: &mut Map<String, Value>, created: bool) {
        let now = timestamp::format_server_millis(self.tick());
        if created {
            record.insert("CreatedDate".into(), Value::from(now.clone()));
        }
        record.insert(names::LAST_MODIFIED_DATE.into(), Value::from(now.clone()));
        record.insert(names::SYSTEM_MODSTAMP.into(), Value::from(now));
        record.insert(names::ID.into(), Value::from(id));
        let mut attributes = Map::new();
        attributes.insert(names::TYPE.into(), Value::from(object_type));
        attributes.insert(
            names::URL.into(),
            Value::from(format!("{SERVICES_DATA}/{}/sobjects/{object_type}/{id}", self.api_version)),
        );
        record.insert(names::ATTRIBUTES.into(), Value::Object(attributes));
    }

    fn writable_fields(fields: &Value) -> ServerResult<Map<String, Value>> {
        let map = fields
            .as_object()
            .ok_or_else(|| ServerError::InvalidRequest("record body must be a JSON object".into()))?;
        Ok(map
            .iter()
            .filter(|(key, _)| !SYSTEM_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    /// Creates a record and returns its new id.
    pub fn create(&mut self, object_type: &str, fields: &Value) -> ServerResult<String> {
        let mut record = Self::writable_fields(fields)?;
        let id = self.new_id(object_type);
        self.stamp(object_type, &id, &mut record, true);
        self.objects
            .entry(object_type.to_string())
            .or_default()
            .insert(id.clone(), record);
        self.touch_recent(object_type, &id);
        Ok(id)
    }

    /// Merges `fields` into an existing record.
    pub fn update(&mut self, object_type: &str, id: &str, fields: &Value) -> ServerResult<()> {
        let changes = Self::writable_fields(fields)?;
        let mut record = self.get(object_type, id)?.clone();
        record.extend(changes);
        self.stamp(object_type, id, &mut record, false);
        self.objects
            .entry(object_type.to_string())
            .or_default()
            .insert(id.to_string(), record);
        self.touch_recent(object_type, id);
        Ok(())
    }

    /// Deletes a record.
    pub fn delete(&mut self, object_type: &str, id: &str) -> ServerResult<()> {
        self.objects
            .get_mut(object_type)
            .and_then(|records| records.remove(id))
            .ok_or_else(|| not_found(object_type, id))?;
        if let Some(recent) = self.recent.get_mut(object_type) {
            recent.retain(|r| r != id);
        }
        Ok(())
    }

    /// Returns one record.
    pub fn get(&self, object_type: &str, id: &str) -> ServerResult<&Map<String, Value>> {
        self.objects
            .get(object_type)
            .and_then(|records| records.get(id))
            .ok_or_else(|| not_found(object_type, id))
    }

    /// Finds the type of the record with `id`.
    pub fn type_of(&self, id: &str) -> Option<&str> {
        self.objects
            .iter()
            .find(|(_, records)| records.contains_key(id))
            .map(|(object_type, _)| object_type.as_str())
    }

    /// Returns true if the server knows `object_type`.
    pub fn has_type(&self, object_type: &str) -> bool {
        self.objects.contains_key(object_type)
    }

    /// Known object types, sorted.
    pub fn types(&self) -> Vec<&str> {
        self.objects.keys().map(String::as_str).collect()
    }

    /// Declares an object type without records.
    pub fn define_type(&mut self, object_type: &str) {
        self.objects.entry(object_type.to_string()).or_default();
    }

    /// All records of `object_type`, ordered by id.
    pub fn records(&self, object_type: &str) -> Vec<&Map<String, Value>> {
        self.objects
            .get(object_type)
            .map(|records| records.values().collect())
            .unwrap_or_default()
    }

    /// Number of records of `object_type`.
    pub fn count(&self, object_type: &str) -> usize {
        self.objects.get(object_type).map_or(0, BTreeMap::len)
    }

    /// Marks a record as viewed, moving it to the front of the recent items.
    pub fn touch_recent(&mut self, object_type: &str, id: &str) {
        let recent = self.recent.entry(object_type.to_string()).or_default();
        recent.retain(|r| r != id);
        recent.push_front(id.to_string());
        recent.truncate(self.max_recent_items);
    }

    /// Recently viewed record ids of `object_type`, most recent first.
    pub fn recent_ids(&self, object_type: &str) -> Vec<String> {
        self.recent
            .get(object_type)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn not_found(object_type: &str, id: &str) -> ServerError {
    ServerError::NotFound {
        object_type: object_type.to_string(),
        id: id.to_string(),
    }
}
