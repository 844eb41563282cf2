//! CLI command implementations.

pub mod dirty;
pub mod show;
pub mod soups;
pub mod syncs;
pub mod verify;

use smartsync_engine::SyncState;
use smartsync_store::{FileStore, QuerySpec, SmartStore};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Page size for scanning soups.
const SCAN_PAGE_SIZE: usize = 500;

/// Opens an existing store directory.
pub fn open_store(path: &Path) -> Result<FileStore, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No store found at {:?}", path).into());
    }
    debug!(path = %path.display(), "opening store");
    Ok(FileStore::open(path)?)
}

/// Reads every record of `soup`, in entry order.
pub fn scan_soup(store: &dyn SmartStore, soup: &str) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let spec = QuerySpec::all(soup, SCAN_PAGE_SIZE)?;
    let mut records = Vec::new();
    for page_index in 0.. {
        let page = store.query(&spec, page_index)?;
        let len = page.len();
        records.extend(page);
        if len < SCAN_PAGE_SIZE {
            break;
        }
    }
    Ok(records)
}

/// Name of the target kind of a sync.
pub fn target_type(state: &SyncState) -> &'static str {
    state
        .down_target()
        .map(|target| target.type_name())
        .or_else(|| state.up_target().map(|target| target.type_name()))
        .unwrap_or("unknown")
}
