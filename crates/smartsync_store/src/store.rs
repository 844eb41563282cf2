//! The `SmartStore` trait.

use crate::error::StoreResult;
use crate::index::IndexSpec;
use crate::query::QuerySpec;
use serde_json::Value;

/// Reserved field holding the store-assigned entry id.
pub const SOUP_ENTRY_ID: &str = "_soupEntryId";

/// Reserved field holding the epoch milliseconds of the last local write.
pub const SOUP_LAST_MODIFIED_DATE: &str = "_soupLastModifiedDate";

/// Durable keyed record storage organised in soups.
///
/// Records are JSON objects. Every write stamps [`SOUP_ENTRY_ID`] and
/// [`SOUP_LAST_MODIFIED_DATE`] and returns the stored record.
///
/// # Invariants
///
/// - Entry ids are unique across the whole store and never reused
/// - A read issued after a write in the same process observes the write
/// - Stores must be `Send + Sync` so sync runs can share them across threads
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait SmartStore: Send + Sync {
    /// Registers a soup. Registering an existing soup is a no-op.
    fn register_soup(&self, name: &str, indexes: &[IndexSpec]) -> StoreResult<()>;

    /// Returns true if the soup exists.
    fn has_soup(&self, name: &str) -> bool;

    /// Removes a soup and all its records.
    fn drop_soup(&self, name: &str) -> StoreResult<()>;

    /// Returns the names of all soups, sorted.
    fn soup_names(&self) -> Vec<String>;

    /// Returns the index specs a soup was registered with.
    fn soup_indexes(&self, name: &str) -> StoreResult<Vec<IndexSpec>>;

    /// Inserts a record, or replaces it when it carries an existing entry id.
    ///
    /// # Errors
    ///
    /// Fails if the soup is unknown, the record is not an object, or the
    /// record names an entry id that does not exist.
    fn upsert(&self, soup: &str, record: Value) -> StoreResult<Value>;

    /// Replaces the record whose value at `external_id_path` equals the
    /// incoming record's, or inserts when there is none.
    fn upsert_with_external_id(
        &self,
        soup: &str,
        record: Value,
        external_id_path: &str,
    ) -> StoreResult<Value>;

    /// Upserts a batch of records on `external_id_path`.
    ///
    /// Stores that persist to disk override this to write once per batch.
    fn upsert_all(
        &self,
        soup: &str,
        records: Vec<Value>,
        external_id_path: &str,
    ) -> StoreResult<Vec<Value>> {
        records
            .into_iter()
            .map(|record| self.upsert_with_external_id(soup, record, external_id_path))
            .collect()
    }

    /// Returns the records with the given entry ids, skipping unknown ids.
    fn retrieve(&self, soup: &str, ids: &[i64]) -> StoreResult<Vec<Value>>;

    /// Replaces the record with entry id `id`.
    fn update(&self, soup: &str, record: Value, id: i64) -> StoreResult<Value>;

    /// Deletes the records with the given entry ids.
    fn delete(&self, soup: &str, ids: &[i64]) -> StoreResult<()>;

    /// Returns page `page_index` (0-based) of the records matching `spec`.
    fn query(&self, spec: &QuerySpec, page_index: usize) -> StoreResult<Vec<Value>>;

    /// Returns the number of records matching `spec`.
    fn count_query(&self, spec: &QuerySpec) -> StoreResult<usize>;
}

/// Resolves a dotted path (`attributes.type`) inside a record.
pub fn project<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(record);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}
