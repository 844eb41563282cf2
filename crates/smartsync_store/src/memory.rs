//! In-memory store for testing.

use crate::error::StoreResult;
use crate::index::IndexSpec;
use crate::query::QuerySpec;
use crate::store::SmartStore;
use crate::table::SoupTable;
use parking_lot::RwLock;
use serde_json::Value;

/// An in-memory soup store.
///
/// This store keeps all soups in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral caches that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use smartsync_store::{InMemoryStore, SmartStore};
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// store.register_soup("contacts", &[]).unwrap();
/// let saved = store.upsert("contacts", json!({"LastName": "Doe"})).unwrap();
/// assert_eq!(saved["_soupEntryId"], 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    table: RwLock<SoupTable>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records across all soups.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.table.read().record_count()
    }
}

impl SmartStore for InMemoryStore {
    fn register_soup(&self, name: &str, indexes: &[IndexSpec]) -> StoreResult<()> {
        self.table.write().register_soup(name, indexes)
    }

    fn has_soup(&self, name: &str) -> bool {
        self.table.read().has_soup(name)
    }

    fn drop_soup(&self, name: &str) -> StoreResult<()> {
        self.table.write().drop_soup(name);
        Ok(())
    }

    fn soup_names(&self) -> Vec<String> {
        self.table.read().soup_names()
    }

    fn soup_indexes(&self, name: &str) -> StoreResult<Vec<IndexSpec>> {
        self.table.read().soup_indexes(name)
    }

    fn upsert(&self, soup: &str, record: Value) -> StoreResult<Value> {
        self.table.write().upsert(soup, record)
    }

    fn upsert_with_external_id(
        &self,
        soup: &str,
        record: Value,
        external_id_path: &str,
    ) -> StoreResult<Value> {
        self.table
            .write()
            .upsert_with_external_id(soup, record, external_id_path)
    }

    fn upsert_all(
        &self,
        soup: &str,
        records: Vec<Value>,
        external_id_path: &str,
    ) -> StoreResult<Vec<Value>> {
        let mut table = self.table.write();
        records
            .into_iter()
            .map(|record| table.upsert_with_external_id(soup, record, external_id_path))
            .collect()
    }

    fn retrieve(&self, soup: &str, ids: &[i64]) -> StoreResult<Vec<Value>> {
        self.table.read().retrieve(soup, ids)
    }

    fn update(&self, soup: &str, record: Value, id: i64) -> StoreResult<Value> {
        self.table.write().update(soup, record, id)
    }

    fn delete(&self, soup: &str, ids: &[i64]) -> StoreResult<()> {
        self.table.write().delete(soup, ids)
    }

    fn query(&self, spec: &QuerySpec, page_index: usize) -> StoreResult<Vec<Value>> {
        self.table.read().query(spec, page_index)
    }

    fn count_query(&self, spec: &QuerySpec) -> StoreResult<usize> {
        self.table.read().count_query(spec)
    }
}
