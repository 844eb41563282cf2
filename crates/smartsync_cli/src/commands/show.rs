//! Show command implementation.

use super::open_store;
use smartsync_engine::SyncState;
use std::path::Path;

/// Runs the show command.
pub fn run(path: &Path, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let state = SyncState::by_id(&store, id)?.ok_or_else(|| format!("No sync with id {id}"))?;
    println!("{}", serde_json::to_string_pretty(&state.to_json())?);
    Ok(())
}
