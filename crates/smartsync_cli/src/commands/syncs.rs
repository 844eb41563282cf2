//! Syncs command implementation.

use super::{open_store, target_type};
use serde::Serialize;
use smartsync_engine::SyncState;
use smartsync_store::SmartStore;
use std::path::Path;

/// One line of the sync listing.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// Sync id.
    pub id: i64,
    /// `SyncDown` or `SyncUp`.
    pub sync_type: String,
    /// Target kind.
    pub target: String,
    /// Soup name.
    pub soup: String,
    /// Status of the latest run.
    pub status: String,
    /// Progress percentage.
    pub progress: u8,
    /// Records of the latest run, -1 if unknown.
    pub total_size: i64,
    /// Time stamp checkpoint.
    pub max_time_stamp: i64,
    /// Error of the latest failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SyncState> for SyncSummary {
    fn from(state: &SyncState) -> Self {
        Self {
            id: state.id(),
            sync_type: state.sync_type().to_string(),
            target: target_type(state).to_string(),
            soup: state.soup_name().to_string(),
            status: state.status().to_string(),
            progress: state.progress(),
            total_size: state.total_size(),
            max_time_stamp: state.max_time_stamp(),
            error: state.error().map(str::to_string),
        }
    }
}

/// Summarizes every persisted sync.
pub fn collect(store: &dyn SmartStore) -> Result<Vec<SyncSummary>, Box<dyn std::error::Error>> {
    Ok(SyncState::all(store)?.iter().map(SyncSummary::from).collect())
}

/// Runs the syncs command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let summaries = collect(&store)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        _ => print_text_output(&summaries),
    }
    Ok(())
}

fn print_text_output(summaries: &[SyncSummary]) {
    if summaries.is_empty() {
        println!("No syncs");
        return;
    }
    println!(
        "{:>6}  {:<8}  {:<9}  {:<20}  {:<7}  {:>4}  {:>6}",
        "ID", "TYPE", "TARGET", "SOUP", "STATUS", "PCT", "TOTAL"
    );
    for summary in summaries {
        println!(
            "{:>6}  {:<8}  {:<9}  {:<20}  {:<7}  {:>3}%  {:>6}",
            summary.id,
            summary.sync_type,
            summary.target,
            summary.soup,
            summary.status,
            summary.progress,
            summary.total_size
        );
        if let Some(error) = &summary.error {
            println!("        error: {error}");
        }
    }
}
