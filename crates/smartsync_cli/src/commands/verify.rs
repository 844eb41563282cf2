//! Verify command implementation.

use super::{open_store, scan_soup};
use serde_json::Value;
use smartsync_engine::{SyncState, SyncStatus, SYNCS_SOUP};
use smartsync_store::{SmartStore, SOUP_ENTRY_ID};
use std::path::Path;
use tracing::warn;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of sync states checked.
    pub states_checked: usize,
    /// Number of states that decoded.
    pub valid_states: usize,
    /// Syncs left `Running`, e.g. by a crash.
    pub interrupted: Vec<i64>,
    /// Decoding errors, one per invalid state.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Decodes every record of the sync state soup.
pub fn collect(store: &dyn SmartStore) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    if !store.has_soup(SYNCS_SOUP) {
        return Ok(result);
    }
    for raw in scan_soup(store, SYNCS_SOUP)? {
        result.states_checked += 1;
        let entry_id = raw.get(SOUP_ENTRY_ID).and_then(Value::as_i64).unwrap_or(-1);
        match SyncState::from_json(&raw) {
            Ok(state) => {
                result.valid_states += 1;
                if state.status() == SyncStatus::Running {
                    result.interrupted.push(state.id());
                }
            }
            Err(e) => {
                warn!(entry_id, error = %e, "invalid sync state");
                result.errors.push(format!("sync {entry_id}: {e}"));
            }
        }
    }
    Ok(result)
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {:?}", path);
    println!();

    let store = open_store(path)?;
    let result = collect(&store)?;
    println!("Sync states checked: {}", result.states_checked);
    println!("Valid:               {}", result.valid_states);
    for id in &result.interrupted {
        println!("  sync {id} was left running");
    }
    for error in &result.errors {
        println!("  {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}
