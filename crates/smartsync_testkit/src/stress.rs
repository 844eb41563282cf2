//! Stress runs for the sync manager.
//!
//! These runs exercise the manager under concurrent syncs and repeated
//! resyncs against one shared reference server.

use crate::fixtures::{scenarios, SyncFixture, ACCOUNT_SOQL};
use smartsync_engine::{MergeMode, SyncConfig, SyncDownTarget, SyncError, SyncOptions};
use smartsync_store::InMemoryStore;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total runs attempted.
    pub total_runs: usize,
    /// Runs that finished `Done`.
    pub successful_runs: usize,
    /// Runs rejected because their soup was busy.
    pub busy_runs: usize,
    /// Runs that failed for any other reason.
    pub failed_runs: usize,
    /// Total duration.
    pub duration: Duration,
    /// Runs per second.
    pub runs_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, busy: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + busy + failed;
        let runs_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_runs: total,
            successful_runs: successful,
            busy_runs: busy,
            failed_runs: failed,
            duration,
            runs_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total runs: {}", self.total_runs);
        println!("Successful: {}", self.successful_runs);
        println!("Busy: {}", self.busy_runs);
        println!("Failed: {}", self.failed_runs);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} runs/sec", self.runs_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Accounts on the server.
    pub records: usize,
    /// Page size of every sync down.
    pub page_size: usize,
    /// Concurrent runs.
    pub threads: usize,
    /// Sequential rounds (for resync runs).
    pub rounds: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            records: 500,
            page_size: 50,
            threads: 8,
            rounds: 20,
        }
    }
}

fn fixture(config: &StressConfig) -> SyncFixture<InMemoryStore> {
    SyncFixture::memory(
        scenarios::seeded_server(config.records),
        SyncConfig::default().with_page_size(config.page_size),
    )
}

fn account_target() -> SyncDownTarget {
    SyncDownTarget::soql(ACCOUNT_SOQL).expect("Invalid query")
}

fn tally(results: Vec<Result<(), SyncError>>, duration: Duration) -> StressTestResult {
    let mut successful = 0;
    let mut busy = 0;
    let mut failed = 0;
    for result in results {
        match result {
            Ok(()) => successful += 1,
            Err(SyncError::SoupBusy { .. }) => busy += 1,
            Err(_) => failed += 1,
        }
    }
    StressTestResult::new(successful, busy, failed, duration)
}

/// Syncs down into one soup per thread, all at once.
///
/// Every run must finish and every soup must end up with all records.
pub fn stress_concurrent_sync_downs(config: &StressConfig) -> StressTestResult {
    let fixture = fixture(config);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|i| {
            fixture.manager.spawn_sync_down(
                account_target(),
                format!("accounts_{i}"),
                SyncOptions::for_sync_down(MergeMode::Overwrite),
                |_| {},
            )
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .enumerate()
        .map(|(i, handle)| {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(SyncError::invalid_options("sync thread panicked")));
            outcome.and_then(|_| {
                let count = fixture.soup_records(&format!("accounts_{i}")).len();
                if count == config.records {
                    Ok(())
                } else {
                    Err(SyncError::malformed(format!("soup accounts_{i} holds {count} records")))
                }
            })
        })
        .collect();

    tally(results, start.elapsed())
}

/// Starts every thread's sync down on the same soup.
///
/// Runs either finish or are rejected as busy; the soup never holds a
/// partial duplicate.
pub fn stress_contended_soup(config: &StressConfig) -> StressTestResult {
    let fixture = fixture(config);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            fixture.manager.spawn_sync_down(
                account_target(),
                "contended",
                SyncOptions::for_sync_down(MergeMode::Overwrite),
                |_| {},
            )
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .unwrap_or_else(|_| Err(SyncError::invalid_options("sync thread panicked")))
                .map(|_| ())
        })
        .collect();
    let result = tally(results, start.elapsed());

    let stored = fixture.soup_records("contended").len();
    assert_eq!(stored, config.records, "contended soup holds {stored} records");
    assert!(!fixture.manager.is_soup_busy("contended"));
    result
}

/// Touches one account per round and resyncs.
///
/// Every resync after the first sync must fetch exactly the touched record.
pub fn stress_repeated_resync(config: &StressConfig) -> StressTestResult {
    let fixture = fixture(config);
    let start = Instant::now();
    let sync_id = scenarios::sync_accounts_down(&fixture);
    let ids = scenarios::account_ids(&fixture.server);

    let mut results = Vec::with_capacity(config.rounds);
    for round in 0..config.rounds {
        if !ids.is_empty() {
            let id = &ids[round % ids.len()];
            let touched = fixture
                .server
                .update_record("Account", id, serde_json::json!({ "Name": format!("Round {round}") }));
            if let Err(e) = touched {
                results.push(Err(SyncError::malformed(e.to_string())));
                continue;
            }
        }
        let expected = i64::from(!ids.is_empty());
        let outcome = fixture.manager.resync(sync_id, |_| {}).and_then(|state| {
            if state.total_size() == expected {
                Ok(())
            } else {
                Err(SyncError::malformed(format!(
                    "round {round} fetched {} records",
                    state.total_size()
                )))
            }
        });
        results.push(outcome);
    }

    tally(results, start.elapsed())
}
