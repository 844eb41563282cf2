//! Dirty command implementation.

use super::{open_store, scan_soup};
use serde_json::Value;
use smartsync_engine::{record, SyncAction, SyncState, SyncTarget};
use smartsync_store::{SmartStore, SOUP_ENTRY_ID};
use std::path::Path;

/// A record waiting to be synced up.
#[derive(Debug)]
pub struct DirtyRecord {
    /// Local entry id.
    pub entry_id: i64,
    /// Server or local id.
    pub id: String,
    /// Operation a sync up would send.
    pub action: SyncAction,
    /// Error of the last failed attempt.
    pub last_error: Option<String>,
}

impl DirtyRecord {
    fn from_record(record: &Value, id_field: &str) -> Self {
        Self {
            entry_id: record.get(SOUP_ENTRY_ID).and_then(Value::as_i64).unwrap_or(-1),
            id: record
                .get(id_field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            action: SyncAction::for_record(record),
            last_error: record::last_error(record).map(str::to_string),
        }
    }
}

/// Id field used by the syncs of `soup`, newest sync first. Soups no
/// sync targets use `Id`.
fn id_field_name(store: &dyn SmartStore, soup: &str) -> Result<String, Box<dyn std::error::Error>> {
    Ok(SyncState::all(store)?
        .iter()
        .rev()
        .find(|state| state.soup_name() == soup)
        .map(|state| match state.target() {
            SyncTarget::Down(target) => target.id_field_name.clone(),
            SyncTarget::Up(target) => target.id_field_name.clone(),
        })
        .unwrap_or_else(|| "Id".to_string()))
}

/// Lists up to `limit` dirty records of `soup`.
pub fn collect(
    store: &dyn SmartStore,
    soup: &str,
    limit: Option<usize>,
) -> Result<Vec<DirtyRecord>, Box<dyn std::error::Error>> {
    if !store.has_soup(soup) {
        return Err(format!("No soup named {soup:?}").into());
    }
    let id_field = id_field_name(store, soup)?;
    Ok(scan_soup(store, soup)?
        .iter()
        .filter(|r| record::is_dirty(r))
        .take(limit.unwrap_or(usize::MAX))
        .map(|r| DirtyRecord::from_record(r, &id_field))
        .collect())
}

/// Runs the dirty command.
pub fn run(path: &Path, soup: &str, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let dirty = collect(&store, soup, limit)?;
    if dirty.is_empty() {
        println!("No dirty records in {soup}");
        return Ok(());
    }
    for record in &dirty {
        let local = if record::is_local_id(&record.id) { " (local)" } else { "" };
        println!("[{}] {}{} {:?}", record.entry_id, record.id, local, record.action);
        if let Some(error) = &record.last_error {
            println!("    last error: {error}");
        }
    }
    Ok(())
}
