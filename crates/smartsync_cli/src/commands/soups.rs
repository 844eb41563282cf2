//! Soups command implementation.

use super::{open_store, scan_soup};
use serde::Serialize;
use smartsync_engine::{record, SYNCS_SOUP};
use smartsync_store::SmartStore;
use std::path::Path;

/// Statistics for a single soup.
#[derive(Debug, Serialize)]
pub struct SoupStats {
    /// Soup name.
    pub name: String,
    /// Number of records.
    pub records: usize,
    /// Number of records with unsynced local changes.
    pub dirty: usize,
    /// Indexed paths.
    pub indexes: Vec<String>,
}

/// Collects statistics for every soup except the sync state soup.
pub fn collect(store: &dyn SmartStore) -> Result<Vec<SoupStats>, Box<dyn std::error::Error>> {
    let mut names = store.soup_names();
    names.sort();
    let mut stats = Vec::with_capacity(names.len());
    for name in names.into_iter().filter(|name| name != SYNCS_SOUP) {
        let records = scan_soup(store, &name)?;
        let indexes = store
            .soup_indexes(&name)?
            .into_iter()
            .map(|index| index.path)
            .collect();
        stats.push(SoupStats {
            records: records.len(),
            dirty: records.iter().filter(|r| record::is_dirty(r)).count(),
            indexes,
            name,
        });
    }
    Ok(stats)
}

/// Runs the soups command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let stats = collect(&store)?;
    if stats.is_empty() {
        println!("No soups");
        return Ok(());
    }
    for soup in &stats {
        println!(
            "{:<24} {:>8} records  {:>6} dirty  [{}]",
            soup.name,
            soup.records,
            soup.dirty,
            soup.indexes.join(", ")
        );
    }
    Ok(())
}
