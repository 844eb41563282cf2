//! Test fixtures and store helpers.
//!
//! Wires a local store, the in-process reference server and a sync
//! manager together so scenario tests only describe data and edits.

use serde_json::{json, Value};
use smartsync_engine::record::{self, new_local_id};
use smartsync_engine::{
    HttpReply, HttpRequest, LoopbackServer, NetworkClient, SyncConfig, SyncManager, SyncResult,
};
use smartsync_protocol::{RestRequest, RestResponse};
use smartsync_server::{ServerConfig, SyncServer};
use smartsync_store::{FileStore, InMemoryStore, QuerySpec, SmartStore, SOUP_ENTRY_ID};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Soup the account scenarios sync into.
pub const ACCOUNTS_SOUP: &str = "accounts";

/// Query the account scenarios sync down with.
pub const ACCOUNT_SOQL: &str = "select Id, Name, LastModifiedDate from Account";

/// Logical clock start of seeded servers (2024-01-01T00:00:00Z).
pub const CLOCK_START: i64 = 1_704_067_200_000;

/// Network client calling a [`SyncServer`] in-process.
pub struct ServerNetwork {
    server: Arc<SyncServer>,
}

impl ServerNetwork {
    /// Creates a client for `server`.
    pub fn new(server: Arc<SyncServer>) -> Self {
        Self { server }
    }
}

impl NetworkClient for ServerNetwork {
    fn send(&self, request: &RestRequest) -> SyncResult<RestResponse> {
        Ok(self.server.handle(request))
    }
}

/// Raw HTTP adapter so a [`SyncServer`] can sit behind a
/// [`smartsync_engine::LoopbackClient`].
pub struct ServerLoopback {
    server: Arc<SyncServer>,
}

impl ServerLoopback {
    /// Creates an adapter for `server`.
    pub fn new(server: Arc<SyncServer>) -> Self {
        Self { server }
    }
}

impl LoopbackServer for ServerLoopback {
    fn handle(&self, request: &HttpRequest) -> HttpReply {
        let (status, body) =
            self.server
                .handle_raw(request.method.as_str(), &request.url, &request.headers, &request.body);
        HttpReply { status, body }
    }
}

/// A file-backed store in a temporary directory.
pub struct TestStore {
    /// The store instance.
    pub store: Arc<FileStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates an empty file store.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(&temp_dir.path().join("store")).expect("Failed to open file store");
        Self {
            store: Arc::new(store),
            temp_dir,
        }
    }

    /// Store directory.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    /// Closes and reopens the store from disk.
    ///
    /// Panics if another handle to the store is still alive.
    pub fn reopen(self) -> Self {
        let Self { store, temp_dir } = self;
        assert_eq!(Arc::strong_count(&store), 1, "store is still in use");
        drop(store);
        let store = FileStore::open(&temp_dir.path().join("store")).expect("Failed to reopen file store");
        Self {
            store: Arc::new(store),
            temp_dir,
        }
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&InMemoryStore) -> R,
{
    let store = InMemoryStore::new();
    f(&store)
}

/// Runs a test with a temporary file store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileStore, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path();
    f(&test_store.store, &path)
}

/// A store, a server and a manager syncing between them.
pub struct SyncFixture<S: SmartStore> {
    /// The reference server.
    pub server: Arc<SyncServer>,
    /// The local store.
    pub store: Arc<S>,
    /// The sync manager.
    pub manager: Arc<SyncManager<S, ServerNetwork>>,
}

impl SyncFixture<InMemoryStore> {
    /// Creates a fixture over an empty in-memory store.
    pub fn memory(server: Arc<SyncServer>, config: SyncConfig) -> Self {
        Self::with_store(server, Arc::new(InMemoryStore::new()), config)
    }
}

impl<S: SmartStore> SyncFixture<S> {
    /// Creates a fixture over `store`.
    pub fn with_store(server: Arc<SyncServer>, store: Arc<S>, config: SyncConfig) -> Self {
        let network = Arc::new(ServerNetwork::new(Arc::clone(&server)));
        let manager = SyncManager::new(config, Arc::clone(&store), network).expect("Failed to create manager");
        Self {
            server,
            store,
            manager: Arc::new(manager),
        }
    }

    /// Every record of `soup`, in entry order.
    pub fn soup_records(&self, soup: &str) -> Vec<Value> {
        if !self.store.has_soup(soup) {
            return Vec::new();
        }
        let spec = QuerySpec::all(soup, 100_000).expect("Failed to build query");
        self.store.query(&spec, 0).expect("Failed to query soup")
    }

    /// Dirty records of `soup`.
    pub fn dirty_records(&self, soup: &str) -> Vec<Value> {
        self.soup_records(soup).into_iter().filter(record::is_dirty).collect()
    }

    /// The local record whose `Id` is `id`.
    pub fn local(&self, soup: &str, id: &str) -> Option<Value> {
        let spec = QuerySpec::exact(soup, "Id", json!(id), 1).expect("Failed to build query");
        self.store.query(&spec, 0).expect("Failed to query soup").into_iter().next()
    }

    /// Changes `field` of a local record and flags it updated.
    pub fn edit_locally(&self, soup: &str, id: &str, field: &str, value: Value) {
        let mut local = self.local(soup, id).expect("No such local record");
        local[field] = value;
        record::mark_locally_updated(&mut local);
        self.write_back(soup, local);
    }

    /// Flags a local record deleted.
    pub fn delete_locally(&self, soup: &str, id: &str) {
        let mut local = self.local(soup, id).expect("No such local record");
        record::mark_locally_deleted(&mut local);
        self.write_back(soup, local);
    }

    /// Adds a locally created record of `object_type` and returns its local id.
    pub fn create_locally(&self, soup: &str, object_type: &str, fields: Value) -> String {
        let id = new_local_id();
        let mut created = fields;
        created["Id"] = json!(id);
        created["attributes"] = json!({ "type": object_type });
        record::mark_locally_created(&mut created);
        self.store.upsert(soup, created).expect("Failed to insert local record");
        id
    }

    fn write_back(&self, soup: &str, record: Value) {
        let entry_id = record[SOUP_ENTRY_ID].as_i64().expect("Record without entry id");
        self.store.update(soup, record, entry_id).expect("Failed to update local record");
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use smartsync_engine::{MergeMode, SyncDownTarget, SyncOptions};

    /// A server holding `count` accounts named `Account 000`, `Account 001`, ...
    ///
    /// Account `i` is stamped `CLOCK_START + (i + 1) * 1000`.
    pub fn seeded_server(count: usize) -> Arc<SyncServer> {
        let server = SyncServer::new(ServerConfig::default().with_clock(CLOCK_START, 1000));
        server.define_object("Account");
        for i in 0..count {
            server
                .insert_record("Account", json!({ "Name": format!("Account {i:03}") }))
                .expect("Failed to seed account");
        }
        Arc::new(server)
    }

    /// Ids of every account on `server`, in creation order.
    pub fn account_ids(server: &SyncServer) -> Vec<String> {
        server
            .records("Account")
            .iter()
            .filter_map(|record| record["Id"].as_str().map(str::to_string))
            .collect()
    }

    /// A fixture whose store already holds `count` synced accounts.
    pub fn synced_accounts(count: usize, page_size: usize) -> SyncFixture<InMemoryStore> {
        let fixture = SyncFixture::memory(seeded_server(count), SyncConfig::default().with_page_size(page_size));
        sync_accounts_down(&fixture);
        fixture
    }

    /// Runs a full account sync down and returns the sync id.
    pub fn sync_accounts_down<S: SmartStore>(fixture: &SyncFixture<S>) -> i64 {
        fixture
            .manager
            .sync_down(
                SyncDownTarget::soql(ACCOUNT_SOQL).expect("Invalid query"),
                ACCOUNTS_SOUP,
                SyncOptions::for_sync_down(MergeMode::Overwrite),
                |_| {},
            )
            .expect("Sync down failed")
            .id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_accounts_scenario() {
        let fixture = scenarios::synced_accounts(7, 3);
        assert_eq!(fixture.soup_records(ACCOUNTS_SOUP).len(), 7);
        assert!(fixture.dirty_records(ACCOUNTS_SOUP).is_empty());
        assert_eq!(fixture.server.request_count(), 3);
    }

    #[test]
    fn local_edits_flag_records() {
        let fixture = scenarios::synced_accounts(2, 10);
        let ids = scenarios::account_ids(&fixture.server);
        fixture.edit_locally(ACCOUNTS_SOUP, &ids[0], "Name", json!("Edited"));
        fixture.delete_locally(ACCOUNTS_SOUP, &ids[1]);
        let created = fixture.create_locally(ACCOUNTS_SOUP, "Account", json!({ "Name": "New" }));

        assert_eq!(fixture.dirty_records(ACCOUNTS_SOUP).len(), 3);
        assert!(record::is_local_id(&created));
        let local = fixture.local(ACCOUNTS_SOUP, &created).unwrap();
        assert_eq!(record::object_type(&local), Some("Account"));
    }

    #[test]
    fn file_store_reopens() {
        let test_store = TestStore::file();
        let id = {
            let fixture = SyncFixture::with_store(
                scenarios::seeded_server(3),
                Arc::clone(&test_store.store),
                SyncConfig::default(),
            );
            scenarios::sync_accounts_down(&fixture)
        };
        let test_store = test_store.reopen();
        let state = smartsync_engine::SyncState::by_id(test_store.store.as_ref(), id)
            .unwrap()
            .unwrap();
        assert_eq!(state.total_size(), 3);
    }

    #[test]
    fn with_file_store_creates_directory() {
        with_file_store(|store, path| {
            assert!(path.is_dir());
            assert!(store.soup_names().is_empty());
        });
        with_temp_store(|store| assert!(!store.has_soup(ACCOUNTS_SOUP)));
    }
}
