//! Cross-crate integration test helpers.
//!
//! [`SyncHarness`] applies a plan of local edits to synced accounts,
//! tracks what the server should hold afterwards, and checks that a sync
//! up converges to it.

use crate::fixtures::{scenarios, SyncFixture, ACCOUNTS_SOUP};
use crate::generators::LocalEdit;
use serde_json::{json, Value};
use smartsync_engine::{record, MergeMode, SyncOptions, SyncResult, SyncState, SyncUpTarget};
use smartsync_store::{InMemoryStore, IndexSpec, SmartStore};
use std::collections::BTreeMap;

/// A test harness for sync up convergence.
pub struct SyncHarness {
    fixture: SyncFixture<InMemoryStore>,
    /// Synced ids not deleted locally, in creation order.
    live: Vec<String>,
    /// Server id to expected name.
    expected: BTreeMap<String, String>,
    /// Names of records created locally and still pending.
    created: Vec<String>,
}

impl SyncHarness {
    /// Syncs `count` seeded accounts down into a fresh store.
    pub fn new(count: usize, page_size: usize) -> Self {
        let fixture = scenarios::synced_accounts(count, page_size);
        fixture
            .store
            .register_soup(ACCOUNTS_SOUP, &[IndexSpec::string("Id")])
            .expect("Failed to register soup");
        let expected: BTreeMap<String, String> = fixture
            .server
            .records("Account")
            .iter()
            .filter_map(|r| Some((r["Id"].as_str()?.to_string(), r["Name"].as_str()?.to_string())))
            .collect();
        Self {
            live: scenarios::account_ids(&fixture.server),
            fixture,
            expected,
            created: Vec::new(),
        }
    }

    /// Returns the underlying fixture.
    pub fn fixture(&self) -> &SyncFixture<InMemoryStore> {
        &self.fixture
    }

    /// Applies one local edit. Edits addressing synced records are skipped
    /// once none are left.
    pub fn apply(&mut self, edit: &LocalEdit) {
        match edit {
            LocalEdit::Update { index, name } => {
                if self.live.is_empty() {
                    return;
                }
                let id = self.live[index % self.live.len()].clone();
                self.fixture.edit_locally(ACCOUNTS_SOUP, &id, "Name", json!(name));
                self.expected.insert(id, name.clone());
            }
            LocalEdit::Delete { index } => {
                if self.live.is_empty() {
                    return;
                }
                let id = self.live.remove(index % self.live.len());
                self.fixture.delete_locally(ACCOUNTS_SOUP, &id);
                self.expected.remove(&id);
            }
            LocalEdit::Create { name } => {
                self.fixture
                    .create_locally(ACCOUNTS_SOUP, "Account", json!({ "Name": name }));
                self.created.push(name.clone());
            }
            LocalEdit::CreateThenDelete { name } => {
                let id = self
                    .fixture
                    .create_locally(ACCOUNTS_SOUP, "Account", json!({ "Name": name }));
                self.fixture.delete_locally(ACCOUNTS_SOUP, &id);
            }
        }
    }

    /// Applies every edit of a plan in order.
    pub fn apply_all(&mut self, edits: &[LocalEdit]) {
        for edit in edits {
            self.apply(edit);
        }
    }

    /// Pushes the dirty records, overwriting server copies.
    pub fn sync_up(&self, target: SyncUpTarget) -> SyncResult<SyncState> {
        let options = SyncOptions::for_sync_up(["Name"], MergeMode::Overwrite)?;
        self.fixture.manager.sync_up(target, options, ACCOUNTS_SOUP, |_| {})
    }

    /// Names the server should hold, sorted.
    pub fn expected_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.expected.values().cloned().chain(self.created.iter().cloned()).collect();
        names.sort();
        names
    }

    /// Asserts that the server holds exactly the expected names and that
    /// the soup mirrors the server with nothing left dirty.
    pub fn verify_converged(&self) {
        let server_records = self.fixture.server.records("Account");
        let mut server_names: Vec<String> = server_records
            .iter()
            .filter_map(|r| r["Name"].as_str().map(str::to_string))
            .collect();
        server_names.sort();
        assert_eq!(server_names, self.expected_names(), "server names diverged");

        for (id, name) in &self.expected {
            let on_server = self.fixture.server.get_record("Account", id);
            assert_eq!(
                on_server.as_ref().map(|r| &r["Name"]),
                Some(&json!(name)),
                "server copy of {id} diverged"
            );
        }

        let local = self.fixture.soup_records(ACCOUNTS_SOUP);
        assert_eq!(local.len(), server_records.len(), "soup and server sizes differ");
        for record in &local {
            assert!(!record::is_dirty(record), "record left dirty: {record}");
            let id = record["Id"].as_str().unwrap_or_default();
            let on_server = self
                .fixture
                .server
                .get_record("Account", id)
                .unwrap_or(Value::Null);
            assert_eq!(on_server["Name"], record["Name"], "local copy of {id} diverged");
        }
    }
}
