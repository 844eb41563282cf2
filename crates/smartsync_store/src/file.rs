//! Directory-backed store for persistent soups.
//!
//! Layout of a store directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK           # Advisory lock for single-process access
//! ├─ SOUPS.json     # All soups and the entry id allocator
//! └─ SOUPS.json.tmp # Written then renamed over SOUPS.json
//! ```

use crate::error::{StoreError, StoreResult};
use crate::index::IndexSpec;
use crate::query::QuerySpec;
use crate::store::SmartStore;
use crate::table::SoupTable;
use fs2::FileExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "SOUPS.json";
const DATA_TEMP: &str = "SOUPS.json.tmp";

/// A soup store persisted to a directory.
///
/// Every mutation rewrites the data file atomically (write to a temp file,
/// `sync_all`, rename), so a crash leaves either the old or the new
/// contents on disk.
///
/// # Thread Safety
///
/// The store is thread-safe. Only one process can open a directory at a
/// time; a second `open` fails with [`StoreError::Locked`].
///
/// # Example
///
/// ```no_run
/// use smartsync_store::{FileStore, SmartStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("my_store")).unwrap();
/// store.register_soup("accounts", &[]).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: RwLock<SoupTable>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists but is not a directory
    /// - Another process holds the lock (returns `Locked`)
    /// - The data file cannot be read or decoded
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("store path is not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let data_path = path.join(DATA_FILE);
        let table = if data_path.exists() {
            let bytes = fs::read(&data_path)?;
            serde_json::from_slice::<SoupTable>(&bytes)?
        } else {
            SoupTable::default()
        };
        debug!(
            path = %path.display(),
            records = table.record_count(),
            "opened file store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            table: RwLock::new(table),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &SoupTable) -> StoreResult<()> {
        let bytes = serde_json::to_vec(table)?;
        let temp_path = self.path.join(DATA_TEMP);
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, self.path.join(DATA_FILE))?;
        Ok(())
    }

    /// Runs a mutation and persists the table if it succeeded.
    ///
    /// On failure the in-memory table is rolled back so memory and disk agree.
    fn mutate<T>(&self, f: impl FnOnce(&mut SoupTable) -> StoreResult<T>) -> StoreResult<T> {
        let mut table = self.table.write();
        let snapshot = table.clone();
        let result = f(&mut table).and_then(|value| {
            self.persist(&table)?;
            Ok(value)
        });
        if result.is_err() {
            *table = snapshot;
        }
        result
    }
}

impl SmartStore for FileStore {
    fn register_soup(&self, name: &str, indexes: &[IndexSpec]) -> StoreResult<()> {
        if self.has_soup(name) {
            return Ok(());
        }
        self.mutate(|table| table.register_soup(name, indexes))
    }

    fn has_soup(&self, name: &str) -> bool {
        self.table.read().has_soup(name)
    }

    fn drop_soup(&self, name: &str) -> StoreResult<()> {
        self.mutate(|table| {
            table.drop_soup(name);
            Ok(())
        })
    }

    fn soup_names(&self) -> Vec<String> {
        self.table.read().soup_names()
    }

    fn soup_indexes(&self, name: &str) -> StoreResult<Vec<IndexSpec>> {
        self.table.read().soup_indexes(name)
    }

    fn upsert(&self, soup: &str, record: Value) -> StoreResult<Value> {
        self.mutate(|table| table.upsert(soup, record))
    }

    fn upsert_with_external_id(
        &self,
        soup: &str,
        record: Value,
        external_id_path: &str,
    ) -> StoreResult<Value> {
        self.mutate(|table| table.upsert_with_external_id(soup, record, external_id_path))
    }

    fn upsert_all(
        &self,
        soup: &str,
        records: Vec<Value>,
        external_id_path: &str,
    ) -> StoreResult<Vec<Value>> {
        self.mutate(|table| {
            records
                .into_iter()
                .map(|record| table.upsert_with_external_id(soup, record, external_id_path))
                .collect()
        })
    }

    fn retrieve(&self, soup: &str, ids: &[i64]) -> StoreResult<Vec<Value>> {
        self.table.read().retrieve(soup, ids)
    }

    fn update(&self, soup: &str, record: Value, id: i64) -> StoreResult<Value> {
        self.mutate(|table| table.update(soup, record, id))
    }

    fn delete(&self, soup: &str, ids: &[i64]) -> StoreResult<()> {
        self.mutate(|table| table.delete(soup, ids))
    }

    fn query(&self, spec: &QuerySpec, page_index: usize) -> StoreResult<Vec<Value>> {
        self.table.read().query(spec, page_index)
    }

    fn count_query(&self, spec: &QuerySpec) -> StoreResult<usize> {
        self.table.read().count_query(spec)
    }
}
