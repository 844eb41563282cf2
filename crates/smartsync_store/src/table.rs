//! In-memory soup table shared by the bundled stores.

use crate::error::{StoreError, StoreResult};
use crate::index::{IndexSpec, IndexType};
use crate::query::QuerySpec;
use crate::store::{project, SOUP_ENTRY_ID, SOUP_LAST_MODIFIED_DATE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One soup: declared indexes plus entries keyed by entry id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Soup {
    indexes: Vec<IndexSpec>,
    entries: BTreeMap<i64, Value>,
}

/// All soups of a store plus the entry id allocator.
///
/// This is also the on-disk document of [`crate::FileStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SoupTable {
    next_entry_id: i64,
    soups: BTreeMap<String, Soup>,
}

impl Default for SoupTable {
    fn default() -> Self {
        Self {
            next_entry_id: 1,
            soups: BTreeMap::new(),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn into_object(record: Value) -> StoreResult<Map<String, Value>> {
    match record {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::invalid_record(format!(
            "expected JSON object, got {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl SoupTable {
    pub(crate) fn register_soup(&mut self, name: &str, indexes: &[IndexSpec]) -> StoreResult<()> {
        if name.is_empty() {
            return Err(StoreError::invalid_query("soup name must not be empty"));
        }
        self.soups.entry(name.to_string()).or_insert_with(|| Soup {
            indexes: indexes.to_vec(),
            entries: BTreeMap::new(),
        });
        Ok(())
    }

    pub(crate) fn has_soup(&self, name: &str) -> bool {
        self.soups.contains_key(name)
    }

    pub(crate) fn drop_soup(&mut self, name: &str) {
        self.soups.remove(name);
    }

    pub(crate) fn record_count(&self) -> usize {
        self.soups.values().map(|soup| soup.entries.len()).sum()
    }

    pub(crate) fn soup_names(&self) -> Vec<String> {
        self.soups.keys().cloned().collect()
    }

    pub(crate) fn soup(&self, name: &str) -> StoreResult<&Soup> {
        self.soups
            .get(name)
            .ok_or_else(|| StoreError::soup_not_found(name))
    }

    fn soup_mut(&mut self, name: &str) -> StoreResult<&mut Soup> {
        self.soups
            .get_mut(name)
            .ok_or_else(|| StoreError::soup_not_found(name))
    }

    pub(crate) fn soup_indexes(&self, name: &str) -> StoreResult<Vec<IndexSpec>> {
        Ok(self.soup(name)?.indexes.clone())
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        id
    }

    fn write_entry(&mut self, soup: &str, id: i64, mut record: Map<String, Value>) -> StoreResult<Value> {
        record.insert(SOUP_ENTRY_ID.to_string(), Value::from(id));
        record.insert(SOUP_LAST_MODIFIED_DATE.to_string(), Value::from(now_millis()));
        let record = Value::Object(record);
        self.soup_mut(soup)?.entries.insert(id, record.clone());
        Ok(record)
    }

    pub(crate) fn upsert(&mut self, soup: &str, record: Value) -> StoreResult<Value> {
        let record = into_object(record)?;
        let id = match record.get(SOUP_ENTRY_ID).and_then(Value::as_i64) {
            Some(id) => {
                if !self.soup(soup)?.entries.contains_key(&id) {
                    return Err(StoreError::EntryNotFound {
                        soup: soup.to_string(),
                        id,
                    });
                }
                id
            }
            None => {
                self.soup(soup)?;
                self.allocate_id()
            }
        };
        self.write_entry(soup, id, record)
    }

    pub(crate) fn upsert_with_external_id(
        &mut self,
        soup: &str,
        record: Value,
        external_id_path: &str,
    ) -> StoreResult<Value> {
        if external_id_path == SOUP_ENTRY_ID {
            return self.upsert(soup, record);
        }

        let external = match project(&record, external_id_path) {
            Some(value) if !value.is_null() => Some(value.clone()),
            _ => None,
        };
        let mut record = into_object(record)?;

        let Some(external) = external else {
            record.remove(SOUP_ENTRY_ID);
            self.soup(soup)?;
            let id = self.allocate_id();
            return self.write_entry(soup, id, record);
        };

        let matches: Vec<i64> = self
            .soup(soup)?
            .entries
            .iter()
            .filter(|(_, entry)| project(entry, external_id_path) == Some(&external))
            .map(|(id, _)| *id)
            .collect();

        let id = match matches.as_slice() {
            [] => self.allocate_id(),
            [id] => *id,
            _ => {
                return Err(StoreError::DuplicateExternalId {
                    soup: soup.to_string(),
                    value: external.to_string(),
                    count: matches.len(),
                })
            }
        };
        self.write_entry(soup, id, record)
    }

    pub(crate) fn retrieve(&self, soup: &str, ids: &[i64]) -> StoreResult<Vec<Value>> {
        let soup = self.soup(soup)?;
        Ok(ids
            .iter()
            .filter_map(|id| soup.entries.get(id).cloned())
            .collect())
    }

    pub(crate) fn update(&mut self, soup: &str, record: Value, id: i64) -> StoreResult<Value> {
        let record = into_object(record)?;
        if !self.soup(soup)?.entries.contains_key(&id) {
            return Err(StoreError::EntryNotFound {
                soup: soup.to_string(),
                id,
            });
        }
        self.write_entry(soup, id, record)
    }

    pub(crate) fn delete(&mut self, soup: &str, ids: &[i64]) -> StoreResult<()> {
        let soup = self.soup_mut(soup)?;
        for id in ids {
            soup.entries.remove(id);
        }
        Ok(())
    }

    /// Looks up the queried soup, checking that a match query targets a
    /// full-text indexed path.
    fn queried_soup(&self, spec: &QuerySpec) -> StoreResult<&Soup> {
        let soup = self.soup(&spec.soup_name)?;
        if let Some(path) = spec.full_text_path() {
            let indexed = soup
                .indexes
                .iter()
                .any(|index| index.path == path && index.index_type == IndexType::FullText);
            if !indexed {
                return Err(StoreError::invalid_query(format!(
                    "soup {} has no full_text index on {path}",
                    spec.soup_name
                )));
            }
        }
        Ok(soup)
    }

    fn matching(&self, spec: &QuerySpec) -> StoreResult<Vec<Value>> {
        let soup = self.queried_soup(spec)?;
        let mut records: Vec<Value> = soup
            .entries
            .values()
            .filter(|record| spec.matches(record))
            .cloned()
            .collect();
        spec.sort(&mut records);
        Ok(records)
    }

    pub(crate) fn query(&self, spec: &QuerySpec, page_index: usize) -> StoreResult<Vec<Value>> {
        let records = self.matching(spec)?;
        Ok(records
            .into_iter()
            .skip(page_index.saturating_mul(spec.page_size))
            .take(spec.page_size)
            .collect())
    }

    pub(crate) fn count_query(&self, spec: &QuerySpec) -> StoreResult<usize> {
        let soup = self.queried_soup(spec)?;
        Ok(soup.entries.values().filter(|r| spec.matches(r)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table_with_soup() -> SoupTable {
        let mut table = SoupTable::default();
        table.register_soup("accounts", &[]).unwrap();
        table
    }

    #[test]
    fn upsert_assigns_increasing_ids() {
        let mut table = table_with_soup();
        let a = table.upsert("accounts", json!({"Name": "a"})).unwrap();
        let b = table.upsert("accounts", json!({"Name": "b"})).unwrap();
        assert_eq!(a[SOUP_ENTRY_ID], 1);
        assert_eq!(b[SOUP_ENTRY_ID], 2);
        assert!(a[SOUP_LAST_MODIFIED_DATE].is_i64());
    }

    #[test]
    fn upsert_with_unknown_entry_id_fails() {
        let mut table = table_with_soup();
        let err = table
            .upsert("accounts", json!({"_soupEntryId": 42, "Name": "a"}))
            .unwrap_err();
        assert!(matches!(err, StoreError::EntryNotFound { id: 42, .. }));
    }

    #[test]
    fn upsert_rejects_non_objects() {
        let mut table = table_with_soup();
        let err = table.upsert("accounts", json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[test]
    fn external_id_upsert_replaces_matching_entry() {
        let mut table = table_with_soup();
        let first = table
            .upsert_with_external_id("accounts", json!({"Id": "001", "Name": "old"}), "Id")
            .unwrap();
        let second = table
            .upsert_with_external_id("accounts", json!({"Id": "001", "Name": "new"}), "Id")
            .unwrap();
        assert_eq!(first[SOUP_ENTRY_ID], second[SOUP_ENTRY_ID]);

        let spec = QuerySpec::all("accounts", 10).unwrap();
        let all = table.query(&spec, 0).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["Name"], "new");
    }

    #[test]
    fn external_id_upsert_detects_duplicates() {
        let mut table = table_with_soup();
        table.upsert("accounts", json!({"Id": "001"})).unwrap();
        table.upsert("accounts", json!({"Id": "001"})).unwrap();
        let err = table
            .upsert_with_external_id("accounts", json!({"Id": "001"}), "Id")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateExternalId { count: 2, .. }));
    }

    #[test]
    fn query_pages() {
        let mut table = table_with_soup();
        for i in 0..5 {
            table.upsert("accounts", json!({"n": i})).unwrap();
        }
        let spec = QuerySpec::all("accounts", 2).unwrap();
        assert_eq!(table.query(&spec, 0).unwrap().len(), 2);
        assert_eq!(table.query(&spec, 2).unwrap().len(), 1);
        assert!(table.query(&spec, 3).unwrap().is_empty());
        assert_eq!(table.count_query(&spec).unwrap(), 5);
    }

    #[test]
    fn match_queries_need_a_full_text_index() {
        let mut table = SoupTable::default();
        table
            .register_soup("notes", &[IndexSpec::string("Id"), IndexSpec::full_text("Body")])
            .unwrap();
        table.upsert("notes", json!({"Id": "1", "Body": "Quarterly sales review"})).unwrap();
        table.upsert("notes", json!({"Id": "2", "Body": "Sales kickoff"})).unwrap();
        table.upsert("notes", json!({"Id": "3", "Body": "Hiring plan"})).unwrap();

        let spec = QuerySpec::match_text("notes", "Body", "sales", 10).unwrap();
        let found = table.query(&spec, 0).unwrap();
        let ids: Vec<&str> = found.iter().filter_map(|r| r["Id"].as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(table.count_query(&spec).unwrap(), 2);

        let not_indexed = QuerySpec::match_text("notes", "Id", "1", 10).unwrap();
        assert!(matches!(
            table.query(&not_indexed, 0),
            Err(StoreError::InvalidQuery { .. })
        ));
        assert!(table.count_query(&not_indexed).is_err());
    }

    #[test]
    fn unknown_soup_errors() {
        let table = SoupTable::default();
        let spec = QuerySpec::all("missing", 2).unwrap();
        assert!(matches!(
            table.query(&spec, 0),
            Err(StoreError::SoupNotFound { .. })
        ));
    }
}
