//! End-to-end sync runs against the in-process reference server.

use parking_lot::Mutex;
use serde_json::{json, Value};
use smartsync_engine::record::{self, new_local_id};
use smartsync_engine::{
    HttpReply, HttpRequest, LoopbackClient, LoopbackServer, MergeMode, NetworkClient, RestClient,
    SyncConfig, SyncDownTarget, SyncError, SyncManager, SyncOptions, SyncResult, SyncState, SyncStatus,
    SyncUpTarget,
};
use smartsync_protocol::{timestamp, RestRequest, RestResponse};
use smartsync_server::{ServerConfig, SyncServer};
use smartsync_store::{FileStore, InMemoryStore, IndexSpec, QuerySpec, SmartStore, SOUP_ENTRY_ID};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

const CLOCK_START: i64 = 1_704_067_200_000;
const SOQL: &str = "select Id, Name, LastModifiedDate from Account";

/// Sends requests straight to the server's handler.
struct ServerNetwork {
    server: Arc<SyncServer>,
}

impl NetworkClient for ServerNetwork {
    fn send(&self, request: &RestRequest) -> SyncResult<RestResponse> {
        Ok(self.server.handle(request))
    }
}

/// Serves raw HTTP exchanges for a [`LoopbackClient`].
struct ServerLoopback {
    server: Arc<SyncServer>,
}

impl LoopbackServer for ServerLoopback {
    fn handle(&self, request: &HttpRequest) -> HttpReply {
        let (status, body) =
            self.server
                .handle_raw(request.method.as_str(), &request.url, &request.headers, &request.body);
        HttpReply { status, body }
    }
}

type Manager<S> = SyncManager<S, ServerNetwork>;

fn server_with_accounts(count: usize) -> Arc<SyncServer> {
    let server = Arc::new(SyncServer::new(ServerConfig::default().with_clock(CLOCK_START, 1000)));
    server.define_object("Account");
    for i in 0..count {
        server
            .insert_record("Account", json!({"Name": format!("Account {i:03}")}))
            .unwrap();
    }
    server
}

fn manager_on<S: SmartStore>(server: &Arc<SyncServer>, store: Arc<S>, page_size: usize) -> Manager<S> {
    let network = Arc::new(ServerNetwork {
        server: Arc::clone(server),
    });
    SyncManager::new(SyncConfig::default().with_page_size(page_size), store, network).unwrap()
}

fn soup_records(store: &dyn SmartStore, soup: &str) -> Vec<Value> {
    store.query(&QuerySpec::all(soup, 10_000).unwrap(), 0).unwrap()
}

fn local_by_id(store: &dyn SmartStore, soup: &str, id: &str) -> Value {
    let spec = QuerySpec::exact(soup, "Id", json!(id), 1).unwrap();
    store.query(&spec, 0).unwrap().into_iter().next().unwrap()
}

fn edit_locally(store: &dyn SmartStore, soup: &str, id: &str, name: &str) {
    let mut local = local_by_id(store, soup, id);
    local["Name"] = json!(name);
    record::mark_locally_updated(&mut local);
    let entry_id = local[SOUP_ENTRY_ID].as_i64().unwrap();
    store.update(soup, local, entry_id).unwrap();
}

fn server_ids(server: &SyncServer) -> Vec<String> {
    server
        .records("Account")
        .iter()
        .map(|r| r["Id"].as_str().unwrap().to_string())
        .collect()
}

fn down_options() -> SyncOptions {
    SyncOptions::for_sync_down(MergeMode::Overwrite)
}

fn up_options(merge_mode: MergeMode) -> SyncOptions {
    SyncOptions::for_sync_up(["Name"], merge_mode).unwrap()
}

#[test]
fn sync_down_pages_through_query() {
    let server = server_with_accounts(80);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 50);

    let updates = Mutex::new(Vec::new());
    let state = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |state| {
            updates.lock().push((state.status(), state.progress()));
        })
        .unwrap();

    assert_eq!(state.status(), SyncStatus::Done);
    assert_eq!(state.progress(), 100);
    assert_eq!(state.total_size(), 80);
    assert_eq!(state.max_time_stamp(), CLOCK_START + 80 * 1000);
    assert_eq!(soup_records(store.as_ref(), "accounts").len(), 80);
    assert_eq!(server.request_count(), 2);
    assert_eq!(server.open_cursors(), 0);

    let updates = updates.into_inner();
    assert!(updates.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(updates.last(), Some(&(SyncStatus::Done, 100)));
    assert!(updates[..updates.len() - 1].iter().all(|(_, p)| *p < 100));
}

#[test]
fn resync_fetches_only_newer_records() {
    let server = server_with_accounts(10);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);

    let first = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();

    let ids = server_ids(&server);
    server.update_record("Account", &ids[3], json!({"Name": "Renamed 3"})).unwrap();
    server.update_record("Account", &ids[7], json!({"Name": "Renamed 7"})).unwrap();

    let again = manager.resync(first.id(), |_| {}).unwrap();
    assert_eq!(again.id(), first.id());
    assert_eq!(again.status(), SyncStatus::Done);
    assert_eq!(again.total_size(), 2);
    assert!(again.max_time_stamp() > first.max_time_stamp());

    assert_eq!(soup_records(store.as_ref(), "accounts").len(), 10);
    assert_eq!(local_by_id(store.as_ref(), "accounts", &ids[3])["Name"], "Renamed 3");
    let last_query = server.request_log().pop().unwrap();
    assert!(last_query.contains("LastModifiedDate%20%3E"), "{last_query}");
}

#[test]
fn failed_sync_down_resumes_from_checkpoint() {
    let server = server_with_accounts(80);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 50);
    server.fail_requests_matching("/query/", 503, Some(1));

    let sync_id = Mutex::new(None);
    let err = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |state| {
            *sync_id.lock() = Some(state.id());
        })
        .unwrap_err();
    assert!(matches!(err, SyncError::Http { status: 503, .. }));

    let sync_id = sync_id.into_inner().unwrap();
    let failed = manager.get_sync_status(sync_id).unwrap().unwrap();
    assert_eq!(failed.status(), SyncStatus::Failed);
    assert_eq!(failed.max_time_stamp(), CLOCK_START + 50 * 1000);
    assert!(failed.error().unwrap().contains("503"));
    assert_eq!(soup_records(store.as_ref(), "accounts").len(), 50);

    let resumed = manager.resync(sync_id, |_| {}).unwrap();
    assert_eq!(resumed.status(), SyncStatus::Done);
    assert_eq!(resumed.total_size(), 30);
    assert_eq!(soup_records(store.as_ref(), "accounts").len(), 80);
}

#[test]
fn sync_up_keeps_failed_record_dirty() {
    let server = server_with_accounts(3);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();

    let ids = server_ids(&server);
    for (i, id) in ids.iter().enumerate() {
        edit_locally(store.as_ref(), "accounts", id, &format!("Local {i}"));
    }
    server.fail_record(&ids[1], 400);

    let progress = Mutex::new(Vec::new());
    let err = manager
        .sync_up(SyncUpTarget::rest(), up_options(MergeMode::Overwrite), "accounts", |state| {
            progress.lock().push(state.progress());
        })
        .unwrap_err();
    assert!(matches!(err, SyncError::PartialFailure { failed: 1, total: 3 }));
    let progress = progress.into_inner();
    assert_eq!(&progress[..5], &[0, 0, 33, 66, 99]);
    assert!(progress.iter().all(|p| *p < 100));

    assert_eq!(server.get_record("Account", &ids[0]).unwrap()["Name"], "Local 0");
    assert_eq!(server.get_record("Account", &ids[1]).unwrap()["Name"], "Account 001");
    assert_eq!(server.get_record("Account", &ids[2]).unwrap()["Name"], "Local 2");

    assert!(!record::is_dirty(&local_by_id(store.as_ref(), "accounts", &ids[0])));
    let failed = local_by_id(store.as_ref(), "accounts", &ids[1]);
    assert!(record::is_dirty(&failed));
    assert!(record::last_error(&failed).unwrap().contains("rejected"));
    assert!(!record::is_dirty(&local_by_id(store.as_ref(), "accounts", &ids[2])));

    server.clear_failures();
    let retried = manager
        .sync_up(SyncUpTarget::rest(), up_options(MergeMode::Overwrite), "accounts", |_| {})
        .unwrap();
    assert_eq!(retried.total_size(), 1);
    assert_eq!(server.get_record("Account", &ids[1]).unwrap()["Name"], "Local 1");
}

#[test]
fn leave_if_changed_sync_up_respects_server_edits() {
    let server = server_with_accounts(1);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();

    let id = server_ids(&server).remove(0);
    edit_locally(store.as_ref(), "accounts", &id, "Local edit");
    server.update_record("Account", &id, json!({"Name": "Server edit"})).unwrap();

    let state = manager
        .sync_up(SyncUpTarget::rest(), up_options(MergeMode::LeaveIfChanged), "accounts", |_| {})
        .unwrap();
    assert_eq!(state.status(), SyncStatus::Done);
    assert_eq!(server.get_record("Account", &id).unwrap()["Name"], "Server edit");
    let local = local_by_id(store.as_ref(), "accounts", &id);
    assert!(record::is_dirty(&local));
    assert!(record::last_error(&local).is_some());

    manager
        .sync_up(SyncUpTarget::rest(), up_options(MergeMode::Overwrite), "accounts", |_| {})
        .unwrap();
    assert_eq!(server.get_record("Account", &id).unwrap()["Name"], "Local edit");
    let local = local_by_id(store.as_ref(), "accounts", &id);
    assert!(!record::is_dirty(&local));
    assert!(record::last_error(&local).is_none());
}

#[test]
fn leave_if_changed_sync_down_keeps_local_edits() {
    let server = server_with_accounts(2);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    let options = SyncOptions::for_sync_down(MergeMode::LeaveIfChanged);
    let first = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", options, |_| {})
        .unwrap();

    let ids = server_ids(&server);
    edit_locally(store.as_ref(), "accounts", &ids[0], "Local edit");
    server.update_record("Account", &ids[0], json!({"Name": "Server edit 0"})).unwrap();
    server.update_record("Account", &ids[1], json!({"Name": "Server edit 1"})).unwrap();

    manager.resync(first.id(), |_| {}).unwrap();
    let kept = local_by_id(store.as_ref(), "accounts", &ids[0]);
    assert_eq!(kept["Name"], "Local edit");
    assert!(record::is_dirty(&kept));
    assert_eq!(local_by_id(store.as_ref(), "accounts", &ids[1])["Name"], "Server edit 1");
}

fn push_two_edits_leave_if_changed(target: SyncUpTarget) {
    let server = server_with_accounts(2);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();
    let id = server_ids(&server).remove(0);

    for edit in ["First edit", "Second edit"] {
        edit_locally(store.as_ref(), "accounts", &id, edit);
        let state = manager
            .sync_up(target.clone(), up_options(MergeMode::LeaveIfChanged), "accounts", |_| {})
            .unwrap();
        assert_eq!(state.status(), SyncStatus::Done);
        assert_eq!(server.get_record("Account", &id).unwrap()["Name"], edit);

        let local = local_by_id(store.as_ref(), "accounts", &id);
        assert!(!record::is_dirty(&local));
        assert!(record::last_error(&local).is_none());
        let server_date = server.get_record("Account", &id).unwrap()["LastModifiedDate"].clone();
        assert_eq!(
            local["LastModifiedDate"].as_str().and_then(timestamp::parse_millis),
            server_date.as_str().and_then(timestamp::parse_millis)
        );
    }
}

#[test]
fn leave_if_changed_sync_up_accepts_own_previous_push() {
    push_two_edits_leave_if_changed(SyncUpTarget::rest());
}

#[test]
fn leave_if_changed_composite_sync_up_accepts_own_previous_push() {
    push_two_edits_leave_if_changed(SyncUpTarget::composite(5).unwrap());
}

#[test]
fn leave_if_changed_sync_down_keeps_newer_clean_record() {
    let server = server_with_accounts(2);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    let first = manager
        .sync_down(
            SyncDownTarget::soql(SOQL).unwrap(),
            "accounts",
            SyncOptions::for_sync_down(MergeMode::LeaveIfChanged),
            |_| {},
        )
        .unwrap();

    let ids = server_ids(&server);
    let mut local = local_by_id(store.as_ref(), "accounts", &ids[0]);
    local["Name"] = json!("Newer locally");
    local["LastModifiedDate"] = json!("2030-01-01T00:00:00.000+0000");
    let entry_id = local[SOUP_ENTRY_ID].as_i64().unwrap();
    store.update("accounts", local, entry_id).unwrap();
    server.update_record("Account", &ids[0], json!({"Name": "Server edit 0"})).unwrap();
    server.update_record("Account", &ids[1], json!({"Name": "Server edit 1"})).unwrap();

    manager.resync(first.id(), |_| {}).unwrap();
    let kept = local_by_id(store.as_ref(), "accounts", &ids[0]);
    assert!(!record::is_dirty(&kept));
    assert_eq!(kept["Name"], "Newer locally");
    assert_eq!(kept["LastModifiedDate"], "2030-01-01T00:00:00.000+0000");
    assert_eq!(local_by_id(store.as_ref(), "accounts", &ids[1])["Name"], "Server edit 1");
}

#[test]
fn overwrite_sync_down_replaces_dirty_and_newer_records() {
    let server = server_with_accounts(2);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    let first = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();

    let ids = server_ids(&server);
    edit_locally(store.as_ref(), "accounts", &ids[0], "Local edit");
    let mut dirty = local_by_id(store.as_ref(), "accounts", &ids[0]);
    record::set_last_error(&mut dirty, "rejected earlier");
    let entry_id = dirty[SOUP_ENTRY_ID].as_i64().unwrap();
    store.update("accounts", dirty, entry_id).unwrap();

    let mut newer = local_by_id(store.as_ref(), "accounts", &ids[1]);
    newer["Name"] = json!("Newer locally");
    newer["LastModifiedDate"] = json!("2030-01-01T00:00:00.000+0000");
    let entry_id = newer[SOUP_ENTRY_ID].as_i64().unwrap();
    store.update("accounts", newer, entry_id).unwrap();

    server.update_record("Account", &ids[0], json!({"Name": "Server edit 0"})).unwrap();
    server.update_record("Account", &ids[1], json!({"Name": "Server edit 1"})).unwrap();
    manager.resync(first.id(), |_| {}).unwrap();

    for (i, id) in ids.iter().enumerate() {
        let local = local_by_id(store.as_ref(), "accounts", id);
        assert_eq!(local["Name"], json!(format!("Server edit {i}")));
        assert!(!record::is_dirty(&local));
        assert!(record::last_error(&local).is_none());
        assert_eq!(
            local["LastModifiedDate"],
            server.get_record("Account", id).unwrap()["LastModifiedDate"]
        );
    }
}

#[test]
fn repeated_sync_down_leaves_soup_unchanged() {
    let server = server_with_accounts(25);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 10);

    let snapshot = || {
        let mut records = soup_records(store.as_ref(), "accounts");
        for record in &mut records {
            if let Some(map) = record.as_object_mut() {
                map.remove("_soupLastModifiedDate");
            }
        }
        records.sort_by(|a, b| a["Id"].as_str().cmp(&b["Id"].as_str()));
        records
    };

    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();
    let once = snapshot();
    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();
    let twice = snapshot();

    assert_eq!(once.len(), 25);
    assert_eq!(once, twice);
}

#[test]
fn created_and_deleted_records() {
    let server = server_with_accounts(1);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();
    let existing = server_ids(&server).remove(0);

    let mut created = json!({"Id": new_local_id(), "Name": "Fresh", "attributes": {"type": "Account"}});
    record::mark_locally_created(&mut created);
    store.upsert("accounts", created).unwrap();

    let mut short_lived = json!({"Id": new_local_id(), "Name": "Gone", "attributes": {"type": "Account"}});
    record::mark_locally_created(&mut short_lived);
    record::mark_locally_deleted(&mut short_lived);
    store.upsert("accounts", short_lived).unwrap();

    let mut deleted = local_by_id(store.as_ref(), "accounts", &existing);
    record::mark_locally_deleted(&mut deleted);
    let entry_id = deleted[SOUP_ENTRY_ID].as_i64().unwrap();
    store.update("accounts", deleted, entry_id).unwrap();

    let before = server.request_count();
    let state = manager
        .sync_up(
            SyncUpTarget::rest(),
            SyncOptions::for_sync_up(Vec::<String>::new(), MergeMode::Overwrite).unwrap(),
            "accounts",
            |_| {},
        )
        .unwrap();
    assert_eq!(state.total_size(), 3);
    // Create, read back its date, delete
    assert_eq!(server.request_count() - before, 3);

    let server_records = server.records("Account");
    assert_eq!(server_records.len(), 1);
    assert_eq!(server_records[0]["Name"], "Fresh");

    let local = soup_records(store.as_ref(), "accounts");
    assert_eq!(local.len(), 1);
    assert_eq!(local[0]["Id"], server_records[0]["Id"]);
    assert!(!record::is_dirty(&local[0]));
}

#[test]
fn composite_sync_up_batches_records() {
    let server = server_with_accounts(4);
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();

    let ids = server_ids(&server);
    for id in &ids {
        edit_locally(store.as_ref(), "accounts", id, &format!("Batched {id}"));
    }
    let mut created = json!({"Id": new_local_id(), "Name": "Batched new", "attributes": {"type": "Account"}});
    record::mark_locally_created(&mut created);
    store.upsert("accounts", created).unwrap();

    let before = server.request_count();
    let state = manager
        .sync_up(SyncUpTarget::composite(2).unwrap(), up_options(MergeMode::Overwrite), "accounts", |_| {})
        .unwrap();
    assert_eq!(state.status(), SyncStatus::Done);
    let log: Vec<String> = server.request_log().into_iter().skip(before as usize).collect();
    // Each batch is one composite call followed by one date query
    assert_eq!(log.len(), 6);
    for pair in log.chunks(2) {
        assert_eq!(pair[0], "POST /services/data/v60.0/composite");
        assert!(pair[1].starts_with("GET /services/data/v60.0/query"));
    }

    assert_eq!(server.record_count("Account"), 5);
    for id in &ids {
        assert_eq!(server.get_record("Account", id).unwrap()["Name"], json!(format!("Batched {id}")));
    }
    assert!(soup_records(store.as_ref(), "accounts").iter().all(|r| !record::is_dirty(r)));
}

#[test]
fn mru_and_sosl_targets() {
    let server = server_with_accounts(5);
    server.insert_record("Account", json!({"Name": "Acme Widgets"})).unwrap();
    let store = Arc::new(InMemoryStore::new());
    let manager = manager_on(&server, Arc::clone(&store), 2000);

    let target = SyncDownTarget::sosl("find {acme} in all fields returning Account(Id, Name, LastModifiedDate)").unwrap();
    let state = manager.sync_down(target, "search_hits", down_options(), |_| {}).unwrap();
    assert_eq!(state.total_size(), 1);
    assert_eq!(soup_records(store.as_ref(), "search_hits")[0]["Name"], "Acme Widgets");

    let target = SyncDownTarget::mru("Account", ["Id", "Name", "LastModifiedDate"]).unwrap();
    let state = manager.sync_down(target, "recent", down_options(), |_| {}).unwrap();
    assert_eq!(state.status(), SyncStatus::Done);
    assert_eq!(soup_records(store.as_ref(), "recent").len(), 6);
}

#[test]
fn busy_soup_and_cancel_with_spawned_runs() {
    let server = server_with_accounts(3);
    let store = Arc::new(InMemoryStore::new());
    let manager = Arc::new(manager_on(&server, Arc::clone(&store), 1));

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let paused = AtomicBool::new(false);
    let handle = manager.spawn_sync_down(
        SyncDownTarget::soql(SOQL).unwrap(),
        "accounts",
        down_options(),
        move |state: &SyncState| {
            if !paused.swap(true, Ordering::SeqCst) {
                let _ = started_tx.send(state.id());
                let _ = release_rx.recv();
            }
        },
    );

    let sync_id = started_rx.recv().unwrap();
    assert!(manager.is_soup_busy("accounts"));
    let busy = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap_err();
    assert!(matches!(busy, SyncError::SoupBusy { sync_id: Some(id), .. } if id == sync_id));

    let other = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "other_accounts", down_options(), |_| {})
        .unwrap();
    assert_eq!(other.status(), SyncStatus::Done);

    assert!(manager.cancel(sync_id));
    release_tx.send(()).unwrap();
    let result = handle.join().unwrap();
    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert!(!manager.is_soup_busy("accounts"));

    let cancelled = manager.get_sync_status(sync_id).unwrap().unwrap();
    assert_eq!(cancelled.status(), SyncStatus::Failed);
    let resumed = manager.spawn_resync(sync_id, |_| {}).join().unwrap().unwrap();
    assert_eq!(resumed.status(), SyncStatus::Done);
    assert_eq!(soup_records(store.as_ref(), "accounts").len(), 3);
}

#[test]
fn sync_states_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store");
    let server = server_with_accounts(4);

    let sync_id = {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let manager = manager_on(&server, store, 3);
        manager
            .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
            .unwrap()
            .id()
    };

    let store = Arc::new(FileStore::open(&path).unwrap());
    let reopened = SyncState::by_id(store.as_ref(), sync_id).unwrap().unwrap();
    assert_eq!(reopened.status(), SyncStatus::Done);
    assert_eq!(reopened.total_size(), 4);
    assert_eq!(reopened.max_time_stamp(), CLOCK_START + 4000);
    assert_eq!(reopened.down_target().unwrap(), &SyncDownTarget::soql(SOQL).unwrap());
    assert_eq!(soup_records(store.as_ref(), "accounts").len(), 4);
    let newest = soup_records(store.as_ref(), "accounts")
        .iter()
        .filter_map(|r| r["LastModifiedDate"].as_str().and_then(timestamp::parse_millis))
        .max();
    assert_eq!(newest, Some(CLOCK_START + 4000));

    let manager = manager_on(&server, Arc::clone(&store), 3);
    assert!(manager.resync(sync_id, |_| {}).is_ok());
}

#[test]
fn http_loopback_with_bearer_tokens() {
    let config = ServerConfig::default().with_auth(b"loopback-secret".to_vec());
    let server = Arc::new(SyncServer::new(config));
    server.insert_record("Account", json!({"Name": "Over HTTP"})).unwrap();
    let token = server.create_token("integration.user").unwrap();

    let client = RestClient::new(
        "https://acme.my.example.com",
        token,
        LoopbackClient::new(ServerLoopback {
            server: Arc::clone(&server),
        }),
    );
    let store = Arc::new(InMemoryStore::new());
    let manager = SyncManager::new(SyncConfig::default(), Arc::clone(&store), Arc::new(client)).unwrap();

    let state = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();
    assert_eq!(state.status(), SyncStatus::Done);
    assert_eq!(soup_records(store.as_ref(), "accounts")[0]["Name"], "Over HTTP");

    manager.network().set_access_token("forged");
    let err = manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap_err();
    assert!(matches!(err, SyncError::Http { status: 401, .. }));
}

#[test]
fn custom_soup_index_is_reused() {
    let server = server_with_accounts(2);
    let store = Arc::new(InMemoryStore::new());
    store
        .register_soup("accounts", &[IndexSpec::string("Id"), IndexSpec::string("Name")])
        .unwrap();
    let manager = manager_on(&server, Arc::clone(&store), 2000);
    manager
        .sync_down(SyncDownTarget::soql(SOQL).unwrap(), "accounts", down_options(), |_| {})
        .unwrap();
    assert_eq!(store.soup_indexes("accounts").unwrap().len(), 2);
    assert_eq!(soup_records(store.as_ref(), "accounts").len(), 2);
}
