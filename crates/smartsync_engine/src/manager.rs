//! The sync manager runs syncs against a store and a network client.

use crate::config::SyncConfig;
use crate::context::RestContext;
use crate::error::{SyncError, SyncResult};
use crate::network::NetworkClient;
use crate::options::{MergeMode, SyncOptions};
use crate::record;
use crate::state::{setup_syncs_soup, SyncState, SyncStatus, SyncType};
use crate::target::{RecordOutcome, SyncDownTarget, SyncUpTarget, TargetRegistry, UpHandler};
use parking_lot::Mutex;
use serde_json::Value;
use smartsync_protocol::timestamp;
use smartsync_store::{IndexSpec, QuerySpec, SmartStore, SOUP_ENTRY_ID};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// A run holding a soup.
struct ActiveRun {
    sync_id: Option<i64>,
    cancel: Arc<AtomicBool>,
}

/// Releases the soup when the run ends, whatever the exit path.
struct RunGuard<'m> {
    active: &'m Mutex<HashMap<String, ActiveRun>>,
    soup: String,
    cancel: Arc<AtomicBool>,
}

impl RunGuard<'_> {
    fn bind(&self, sync_id: i64) {
        if let Some(run) = self.active.lock().get_mut(&self.soup) {
            run.sync_id = Some(sync_id);
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.soup);
    }
}

fn check_cancelled(cancel: &AtomicBool) -> SyncResult<()> {
    if cancel.load(Ordering::SeqCst) {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

/// Progress while a run is going: never 100 before the run is done.
fn running_progress(processed: usize, total_size: i64) -> u8 {
    let total = usize::try_from(total_size).unwrap_or(0).max(processed);
    if total == 0 {
        return 0;
    }
    (processed * 100 / total).min(99) as u8
}

/// Runs sync downs, sync ups and resyncs.
///
/// The manager is built explicitly from its collaborators. At most one run
/// per soup is active at a time; other runs on the same soup fail with
/// [`SyncError::SoupBusy`]. Every state change is persisted to
/// `syncs_soup` and then reported to the run's `on_update` callback, on the
/// thread executing the run.
///
/// # Example
///
/// ```rust
/// use smartsync_engine::{MergeMode, MockNetwork, SyncConfig, SyncDownTarget, SyncManager, SyncOptions};
/// use smartsync_store::InMemoryStore;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let network = Arc::new(MockNetwork::new());
/// network.push_json(200, json!({"totalSize": 0, "done": true, "records": []}));
/// let manager = SyncManager::new(SyncConfig::default(), Arc::new(InMemoryStore::new()), network).unwrap();
///
/// let state = manager
///     .sync_down(
///         SyncDownTarget::soql("select Id, LastModifiedDate from Account").unwrap(),
///         "accounts",
///         SyncOptions::for_sync_down(MergeMode::Overwrite),
///         |state| println!("{} {}", state.status(), state.progress()),
///     )
///     .unwrap();
/// assert_eq!(state.progress(), 100);
/// ```
pub struct SyncManager<S: SmartStore, N: NetworkClient> {
    config: SyncConfig,
    store: Arc<S>,
    network: Arc<N>,
    registry: TargetRegistry,
    active: Mutex<HashMap<String, ActiveRun>>,
}

impl<S: SmartStore, N: NetworkClient> SyncManager<S, N> {
    /// Creates a manager and registers `syncs_soup` in the store.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the store rejects the soup.
    pub fn new(config: SyncConfig, store: Arc<S>, network: Arc<N>) -> SyncResult<Self> {
        config.validate()?;
        setup_syncs_soup(store.as_ref())?;
        Ok(Self {
            config,
            store,
            network,
            registry: TargetRegistry::new(),
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Uses `registry` to resolve custom targets.
    pub fn with_registry(mut self, registry: TargetRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the network client.
    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    /// Creates a sync down, runs it and returns its final state.
    pub fn sync_down(
        &self,
        target: SyncDownTarget,
        soup_name: &str,
        options: SyncOptions,
        on_update: impl Fn(&SyncState),
    ) -> SyncResult<SyncState> {
        let guard = self.claim(soup_name)?;
        let mut state = SyncState::create_sync_down(self.store.as_ref(), target, options, soup_name)?;
        guard.bind(state.id());
        self.run(&mut state, &guard.cancel, &on_update)?;
        Ok(state)
    }

    /// Creates a sync up, runs it and returns its final state.
    pub fn sync_up(
        &self,
        target: SyncUpTarget,
        options: SyncOptions,
        soup_name: &str,
        on_update: impl Fn(&SyncState),
    ) -> SyncResult<SyncState> {
        let guard = self.claim(soup_name)?;
        let mut state = SyncState::create_sync_up(self.store.as_ref(), target, options, soup_name)?;
        guard.bind(state.id());
        self.run(&mut state, &guard.cancel, &on_update)?;
        Ok(state)
    }

    /// Runs a sync down again, fetching only records modified after the
    /// stored time stamp checkpoint.
    ///
    /// # Errors
    ///
    /// [`SyncError::SyncNotFound`] for unknown ids; [`SyncError::InvalidResync`]
    /// for sync ups and for syncs that are not `Done` or `Failed`.
    pub fn resync(&self, sync_id: i64, on_update: impl Fn(&SyncState)) -> SyncResult<SyncState> {
        let mut state = self
            .get_sync_status(sync_id)?
            .ok_or(SyncError::SyncNotFound { id: sync_id })?;
        if state.sync_type() != SyncType::SyncDown {
            return Err(SyncError::InvalidResync {
                id: sync_id,
                reason: "only sync downs can be resynced".into(),
            });
        }
        if !state.status().is_terminal() {
            return Err(SyncError::InvalidResync {
                id: sync_id,
                reason: format!("sync is {}", state.status()),
            });
        }

        let guard = self.claim(state.soup_name())?;
        guard.bind(sync_id);
        info!(
            sync_id,
            max_time_stamp = state.max_time_stamp(),
            "resyncing from checkpoint"
        );
        state.restart()?;
        self.run(&mut state, &guard.cancel, &on_update)?;
        Ok(state)
    }

    /// Runs a `New` sync created with [`SyncState::create_sync_down`] or
    /// [`SyncState::create_sync_up`].
    pub fn run_sync(&self, mut state: SyncState, on_update: impl Fn(&SyncState)) -> SyncResult<SyncState> {
        if state.status() != SyncStatus::New {
            return Err(SyncError::InvalidStateTransition {
                from: state.status().to_string(),
                to: "run".into(),
            });
        }
        let guard = self.claim(state.soup_name())?;
        guard.bind(state.id());
        self.run(&mut state, &guard.cancel, &on_update)?;
        Ok(state)
    }

    /// Loads the persisted state of a sync.
    pub fn get_sync_status(&self, sync_id: i64) -> SyncResult<Option<SyncState>> {
        SyncState::by_id(self.store.as_ref(), sync_id)
    }

    /// Asks the active run of `sync_id` to stop before its next page or
    /// record. Returns false if that sync is not running.
    pub fn cancel(&self, sync_id: i64) -> bool {
        let active = self.active.lock();
        match active.values().find(|run| run.sync_id == Some(sync_id)) {
            Some(run) => {
                run.cancel.store(true, Ordering::SeqCst);
                info!(sync_id, "cancel requested");
                true
            }
            None => false,
        }
    }

    /// Returns true if a run currently holds `soup_name`.
    pub fn is_soup_busy(&self, soup_name: &str) -> bool {
        self.active.lock().contains_key(soup_name)
    }

    fn claim(&self, soup_name: &str) -> SyncResult<RunGuard<'_>> {
        let mut active = self.active.lock();
        if let Some(run) = active.get(soup_name) {
            return Err(SyncError::SoupBusy {
                soup: soup_name.to_string(),
                sync_id: run.sync_id,
            });
        }
        let cancel = Arc::new(AtomicBool::new(false));
        active.insert(
            soup_name.to_string(),
            ActiveRun {
                sync_id: None,
                cancel: Arc::clone(&cancel),
            },
        );
        Ok(RunGuard {
            active: &self.active,
            soup: soup_name.to_string(),
            cancel,
        })
    }

    fn save_and_notify(&self, state: &SyncState, on_update: &dyn Fn(&SyncState)) -> SyncResult<()> {
        state.save(self.store.as_ref())?;
        on_update(state);
        Ok(())
    }

    fn run(
        &self,
        state: &mut SyncState,
        cancel: &AtomicBool,
        on_update: &dyn Fn(&SyncState),
    ) -> SyncResult<()> {
        state.start()?;
        info!(
            sync_id = state.id(),
            sync_type = %state.sync_type(),
            soup = state.soup_name(),
            "sync started"
        );

        let result = self.save_and_notify(state, on_update).and_then(|()| match state.sync_type() {
            SyncType::SyncDown => self.run_sync_down(state, cancel, on_update),
            SyncType::SyncUp => self.run_sync_up(state, cancel, on_update),
        });

        match result {
            Ok(()) => {
                state.finish()?;
                self.save_and_notify(state, on_update)?;
                info!(
                    sync_id = state.id(),
                    total_size = state.total_size(),
                    max_time_stamp = state.max_time_stamp(),
                    "sync done"
                );
                Ok(())
            }
            Err(e) => {
                warn!(sync_id = state.id(), error = %e, "sync failed");
                if state.fail(e.to_string()).is_ok() {
                    if let Err(save_error) = self.save_and_notify(state, on_update) {
                        warn!(sync_id = state.id(), error = %save_error, "could not persist failed sync");
                    }
                }
                Err(e)
            }
        }
    }

    fn run_sync_down(
        &self,
        state: &mut SyncState,
        cancel: &AtomicBool,
        on_update: &dyn Fn(&SyncState),
    ) -> SyncResult<()> {
        let target = state
            .down_target()
            .cloned()
            .ok_or_else(|| SyncError::invalid_target("sync down without down target"))?;
        let mut fetcher = target.fetcher(&self.registry)?;
        let ctx = RestContext::new(self.network.as_ref(), &self.config);
        let soup = state.soup_name().to_string();
        let merge_mode = state.merge_mode();

        check_cancelled(cancel)?;
        let mut page = fetcher.start_fetch(&ctx, state.max_time_stamp().max(0))?;
        state.set_total_size(page.total_size)?;

        let mut processed = 0;
        loop {
            let count = page.records.len();
            let time_stamp = target.latest_modification_time_stamp(&page.records);
            let written = self.save_records(&target, &soup, merge_mode, std::mem::take(&mut page.records))?;
            processed += count;
            state.advance_max_time_stamp(time_stamp);
            state.set_progress(running_progress(processed, state.total_size()))?;
            self.save_and_notify(state, on_update)?;
            debug!(
                sync_id = state.id(),
                fetched = count,
                written,
                processed,
                total_size = state.total_size(),
                "page saved"
            );

            let Some(cursor) = page.next_cursor.take() else {
                break;
            };
            check_cancelled(cancel)?;
            page = fetcher.continue_fetch(&ctx, &cursor)?;
        }
        Ok(())
    }

    /// Writes fetched records, applying the merge mode. Returns how many
    /// records were written.
    fn save_records(
        &self,
        target: &SyncDownTarget,
        soup: &str,
        merge_mode: MergeMode,
        records: Vec<Value>,
    ) -> SyncResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let id_field = target.id_field_name.as_str();
        if !self.store.has_soup(soup) {
            self.store.register_soup(soup, &[IndexSpec::string(id_field)])?;
        }

        let mut to_write = Vec::with_capacity(records.len());
        for mut incoming in records {
            if merge_mode == MergeMode::LeaveIfChanged && self.keep_local(target, soup, &incoming)? {
                continue;
            }
            record::clean(&mut incoming);
            to_write.push(incoming);
        }
        let written = to_write.len();
        if written > 0 {
            self.store.upsert_all(soup, to_write, id_field)?;
        }
        Ok(written)
    }

    /// Whether the local copy of `incoming` must be left alone: it has
    /// unsynced changes, or it is newer than the incoming record.
    fn keep_local(&self, target: &SyncDownTarget, soup: &str, incoming: &Value) -> SyncResult<bool> {
        let Some(id) = incoming.get(&target.id_field_name).filter(|id| !id.is_null()) else {
            return Ok(false);
        };
        let spec = QuerySpec::exact(soup, target.id_field_name.as_str(), id.clone(), 1)?;
        let Some(local) = self.store.query(&spec, 0)?.into_iter().next() else {
            return Ok(false);
        };
        if record::is_dirty(&local) {
            debug!(soup, id = %id, "keeping locally modified record");
            return Ok(true);
        }
        let modified = |record: &Value| {
            record
                .get(&target.modification_date_field_name)
                .and_then(Value::as_str)
                .and_then(timestamp::parse_millis)
        };
        Ok(matches!(
            (modified(&local), modified(incoming)),
            (Some(local_ts), Some(incoming_ts)) if local_ts > incoming_ts
        ))
    }

    fn run_sync_up(
        &self,
        state: &mut SyncState,
        cancel: &AtomicBool,
        on_update: &dyn Fn(&SyncState),
    ) -> SyncResult<()> {
        let target = state
            .up_target()
            .cloned()
            .ok_or_else(|| SyncError::invalid_target("sync up without up target"))?;
        let handler = target.handler(&self.registry)?;
        let soup = state.soup_name().to_string();
        let merge_mode = state.merge_mode();
        let field_list = state.options().field_list().to_vec();
        let ctx = RestContext::new(self.network.as_ref(), &self.config);

        let ids = target.get_ids_of_records_to_sync_up(self.store.as_ref(), &soup, self.config.page_size)?;
        state.set_total_size(ids.len() as i64)?;
        self.save_and_notify(state, on_update)?;

        let mut processed = 0;
        let mut failed = 0;
        match handler {
            UpHandler::Records(pusher) => {
                for id in &ids {
                    check_cancelled(cancel)?;
                    if let Some(local) = self.store.retrieve(&soup, &[*id])?.into_iter().next() {
                        let outcome = if is_local_only_delete(&local) {
                            RecordOutcome::Deleted
                        } else {
                            match target.push_record(pusher.as_ref(), &ctx, &local, &field_list, merge_mode) {
                                Ok(outcome) => outcome,
                                Err(e) if e.is_record_level() => RecordOutcome::Failed { message: e.to_string() },
                                Err(e) => return Err(e),
                            }
                        };
                        if self.apply_outcome(&target, &soup, local, &outcome)? {
                            failed += 1;
                        }
                    }
                    processed += 1;
                    state.set_progress(running_progress(processed, state.total_size()))?;
                    self.save_and_notify(state, on_update)?;
                }
            }
            UpHandler::Batch(pusher) => {
                let batch_size = pusher.max_batch_size().max(1);
                for chunk in ids.chunks(batch_size) {
                    check_cancelled(cancel)?;
                    let (local_only, to_push): (Vec<Value>, Vec<Value>) = self
                        .store
                        .retrieve(&soup, chunk)?
                        .into_iter()
                        .partition(is_local_only_delete);
                    for local in local_only {
                        self.apply_outcome(&target, &soup, local, &RecordOutcome::Deleted)?;
                    }

                    let outcomes = if to_push.is_empty() {
                        Vec::new()
                    } else {
                        match pusher.sync_up_records(&ctx, &to_push, &field_list, merge_mode, &soup) {
                            Ok(outcomes) => outcomes,
                            Err(e) if e.is_record_level() => {
                                let message = e.to_string();
                                vec![RecordOutcome::Failed { message }; to_push.len()]
                            }
                            Err(e) => return Err(e),
                        }
                    };
                    if outcomes.len() != to_push.len() {
                        return Err(SyncError::invalid_target(format!(
                            "batch pusher returned {} outcomes for {} records",
                            outcomes.len(),
                            to_push.len()
                        )));
                    }
                    for (local, outcome) in to_push.into_iter().zip(&outcomes) {
                        if self.apply_outcome(&target, &soup, local, outcome)? {
                            failed += 1;
                        }
                    }

                    processed += chunk.len();
                    state.set_progress(running_progress(processed, state.total_size()))?;
                    self.save_and_notify(state, on_update)?;
                }
            }
        }

        if failed > 0 {
            return Err(SyncError::PartialFailure {
                failed,
                total: processed,
            });
        }
        Ok(())
    }

    /// Applies a push outcome to the local record. Returns true if the
    /// record failed.
    fn apply_outcome(
        &self,
        target: &SyncUpTarget,
        soup: &str,
        mut local: Value,
        outcome: &RecordOutcome,
    ) -> SyncResult<bool> {
        let entry_id = local
            .get(SOUP_ENTRY_ID)
            .and_then(Value::as_i64)
            .ok_or_else(|| SyncError::malformed("dirty record without entry id"))?;

        match outcome {
            RecordOutcome::Created {
                server_id,
                last_modified_date,
            } => {
                local[target.id_field_name.as_str()] = Value::from(server_id.clone());
                set_last_modified_date(target, &mut local, *last_modified_date);
                record::clean(&mut local);
                self.store.update(soup, local, entry_id)?;
            }
            RecordOutcome::Updated { last_modified_date } => {
                set_last_modified_date(target, &mut local, *last_modified_date);
                record::clean(&mut local);
                self.store.update(soup, local, entry_id)?;
            }
            RecordOutcome::Unchanged => {
                record::clean(&mut local);
                self.store.update(soup, local, entry_id)?;
            }
            RecordOutcome::Deleted => {
                self.store.delete(soup, &[entry_id])?;
            }
            RecordOutcome::Conflict { message } => {
                warn!(soup, entry_id, %message, "server copy changed, record left dirty");
                record::set_last_error(&mut local, message);
                self.store.update(soup, local, entry_id)?;
            }
            RecordOutcome::Failed { message } => {
                warn!(soup, entry_id, %message, "record failed to sync up");
                record::set_last_error(&mut local, message);
                self.store.update(soup, local, entry_id)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Records the server's modification date after a push, so the next
/// leave-if-changed run compares against the pushed version.
fn set_last_modified_date(target: &SyncUpTarget, local: &mut Value, last_modified_date: Option<i64>) {
    if let Some(millis) = last_modified_date {
        local[target.modification_date_field_name.as_str()] = Value::from(timestamp::format_server_millis(millis));
    }
}

fn is_local_only_delete(local: &Value) -> bool {
    record::is_locally_created(local) && record::is_locally_deleted(local)
}

impl<S, N> SyncManager<S, N>
where
    S: SmartStore + 'static,
    N: NetworkClient + 'static,
{
    /// Runs [`Self::sync_down`] on a new thread.
    pub fn spawn_sync_down<F>(
        self: &Arc<Self>,
        target: SyncDownTarget,
        soup_name: impl Into<String>,
        options: SyncOptions,
        on_update: F,
    ) -> JoinHandle<SyncResult<SyncState>>
    where
        F: Fn(&SyncState) + Send + 'static,
    {
        let manager = Arc::clone(self);
        let soup_name = soup_name.into();
        std::thread::spawn(move || manager.sync_down(target, &soup_name, options, on_update))
    }

    /// Runs [`Self::sync_up`] on a new thread.
    pub fn spawn_sync_up<F>(
        self: &Arc<Self>,
        target: SyncUpTarget,
        options: SyncOptions,
        soup_name: impl Into<String>,
        on_update: F,
    ) -> JoinHandle<SyncResult<SyncState>>
    where
        F: Fn(&SyncState) + Send + 'static,
    {
        let manager = Arc::clone(self);
        let soup_name = soup_name.into();
        std::thread::spawn(move || manager.sync_up(target, options, &soup_name, on_update))
    }

    /// Runs [`Self::resync`] on a new thread.
    pub fn spawn_resync<F>(self: &Arc<Self>, sync_id: i64, on_update: F) -> JoinHandle<SyncResult<SyncState>>
    where
        F: Fn(&SyncState) + Send + 'static,
    {
        let manager = Arc::clone(self);
        std::thread::spawn(move || manager.resync(sync_id, on_update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MockNetwork;
    use serde_json::json;
    use smartsync_store::InMemoryStore;

    type TestManager = SyncManager<InMemoryStore, MockNetwork>;

    fn manager() -> (TestManager, Arc<InMemoryStore>, Arc<MockNetwork>) {
        let store = Arc::new(InMemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        let manager = SyncManager::new(SyncConfig::default(), Arc::clone(&store), Arc::clone(&network)).unwrap();
        (manager, store, network)
    }

    fn account(id: &str, seconds: u32) -> Value {
        json!({
            "Id": id,
            "Name": format!("Account {id}"),
            "LastModifiedDate": format!("1970-01-01T00:00:{seconds:02}.000+0000"),
            "attributes": {"type": "Account"},
        })
    }

    fn soql() -> SyncDownTarget {
        SyncDownTarget::soql("select Id, Name, LastModifiedDate from Account").unwrap()
    }

    #[test]
    fn progress_stays_below_100_while_running() {
        assert_eq!(running_progress(0, -1), 0);
        assert_eq!(running_progress(50, 80), 62);
        assert_eq!(running_progress(80, 80), 99);
        assert_eq!(running_progress(10, 5), 99);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = SyncManager::new(
            SyncConfig::default().with_page_size(0),
            Arc::new(InMemoryStore::new()),
            Arc::new(MockNetwork::new()),
        );
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn sync_down_writes_clean_records() {
        let (manager, store, network) = manager();
        network.push_json(200, json!({"totalSize": 2, "done": true, "records": [account("001", 1), account("002", 4)]}));

        let state = manager
            .sync_down(soql(), "accounts", SyncOptions::for_sync_down(MergeMode::Overwrite), |_| {})
            .unwrap();
        assert_eq!(state.status(), SyncStatus::Done);
        assert_eq!(state.max_time_stamp(), 4_000);

        let records = store.query(&QuerySpec::all("accounts", 10).unwrap(), 0).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r[record::LOCAL] == false));
        assert!(!manager.is_soup_busy("accounts"));
    }

    #[test]
    fn leave_if_changed_keeps_dirty_records() {
        let (manager, store, network) = manager();
        store.register_soup("accounts", &[]).unwrap();
        let mut dirty = account("001", 1);
        dirty["Name"] = json!("edited locally");
        record::mark_locally_updated(&mut dirty);
        store.upsert("accounts", dirty).unwrap();

        network.push_json(200, json!({"totalSize": 2, "done": true, "records": [account("001", 9), account("002", 9)]}));
        manager
            .sync_down(soql(), "accounts", SyncOptions::for_sync_down(MergeMode::LeaveIfChanged), |_| {})
            .unwrap();

        let kept = store
            .query(&QuerySpec::exact("accounts", "Id", json!("001"), 1).unwrap(), 0)
            .unwrap();
        assert_eq!(kept[0]["Name"], "edited locally");
        assert!(record::is_dirty(&kept[0]));
        assert_eq!(store.count_query(&QuerySpec::all("accounts", 10).unwrap()).unwrap(), 2);
    }

    #[test]
    fn failed_fetch_persists_failed_state() {
        let (manager, _store, network) = manager();
        network.push_error(SyncError::transport_fatal("offline"));

        let updates = Mutex::new(Vec::new());
        let err = manager
            .sync_down(soql(), "accounts", SyncOptions::default(), |state| {
                updates.lock().push(state.status())
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
        assert_eq!(*updates.lock(), vec![SyncStatus::Running, SyncStatus::Failed]);

        let states = SyncState::all(manager.store().as_ref()).unwrap();
        assert_eq!(states[0].status(), SyncStatus::Failed);
        assert!(states[0].error().unwrap().contains("offline"));
    }

    #[test]
    fn resync_is_only_for_finished_sync_downs() {
        let (manager, store, _network) = manager();
        assert!(matches!(manager.resync(42, |_| {}), Err(SyncError::SyncNotFound { id: 42 })));

        let up = SyncState::create_sync_up(store.as_ref(), SyncUpTarget::rest(), SyncOptions::default(), "accounts")
            .unwrap();
        assert!(matches!(manager.resync(up.id(), |_| {}), Err(SyncError::InvalidResync { .. })));

        let down = SyncState::create_sync_down(store.as_ref(), soql(), SyncOptions::default(), "accounts").unwrap();
        assert!(matches!(manager.resync(down.id(), |_| {}), Err(SyncError::InvalidResync { .. })));
    }

    #[test]
    fn run_sync_requires_new_state() {
        let (manager, store, network) = manager();
        network.push_json(200, json!({"totalSize": 0, "done": true, "records": []}));
        let state = SyncState::create_sync_down(store.as_ref(), soql(), SyncOptions::default(), "accounts").unwrap();

        let done = manager.run_sync(state, |_| {}).unwrap();
        assert_eq!(done.status(), SyncStatus::Done);
        assert!(matches!(
            manager.run_sync(done, |_| {}),
            Err(SyncError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn cancel_unknown_sync_is_false() {
        let (manager, _store, _network) = manager();
        assert!(!manager.cancel(7));
    }

    #[test]
    fn cancel_from_callback_stops_before_first_page() {
        let (manager, store, network) = manager();
        network.push_json(200, json!({"totalSize": 1, "done": true, "records": [account("001", 1)]}));

        let err = manager
            .sync_down(soql(), "accounts", SyncOptions::default(), |state| {
                if state.status() == SyncStatus::Running {
                    manager.cancel(state.id());
                }
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(network.request_count(), 0);
        assert!(!store.has_soup("accounts"));
    }

    #[test]
    fn sync_up_pushes_and_cleans() {
        let (manager, store, network) = manager();
        store.register_soup("accounts", &[]).unwrap();

        let mut created = account(&record::new_local_id(), 0);
        record::mark_locally_created(&mut created);
        store.upsert("accounts", created).unwrap();
        let mut gone = account(&record::new_local_id(), 0);
        record::mark_locally_created(&mut gone);
        record::mark_locally_deleted(&mut gone);
        store.upsert("accounts", gone).unwrap();

        network.push_json(201, json!({"id": "001NEW", "success": true}));
        network.push_json(200, json!({"LastModifiedDate": "2024-01-01T00:00:09.000+0000"}));
        let options = SyncOptions::for_sync_up(["Name"], MergeMode::Overwrite).unwrap();
        let state = manager.sync_up(SyncUpTarget::rest(), options, "accounts", |_| {}).unwrap();
        assert_eq!(state.total_size(), 2);
        assert_eq!(state.progress(), 100);
        // Create and read back; the created-then-deleted record never reached the server
        assert_eq!(network.request_count(), 2);

        let records = store.query(&QuerySpec::all("accounts", 10).unwrap(), 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Id"], "001NEW");
        assert_eq!(records[0]["LastModifiedDate"], "2024-01-01T00:00:09.000+0000");
        assert!(!record::is_dirty(&records[0]));
    }

    #[test]
    fn sync_up_partial_failure_keeps_failed_record_dirty() {
        let (manager, store, network) = manager();
        store.register_soup("accounts", &[]).unwrap();
        for id in ["001", "002"] {
            let mut record = account(id, 1);
            record::mark_locally_updated(&mut record);
            store.upsert("accounts", record).unwrap();
        }
        network.push_error(SyncError::transport_fatal("connection reset"));
        network.push_response(smartsync_protocol::RestResponse::no_content());

        let options = SyncOptions::for_sync_up(["Name"], MergeMode::Overwrite).unwrap();
        let err = manager
            .sync_up(SyncUpTarget::rest(), options, "accounts", |_| {})
            .unwrap_err();
        assert!(matches!(err, SyncError::PartialFailure { failed: 1, total: 2 }));

        let first = &store.retrieve("accounts", &[1]).unwrap()[0];
        assert!(record::is_dirty(first));
        assert!(record::last_error(first).unwrap().contains("connection reset"));
        let second = &store.retrieve("accounts", &[2]).unwrap()[0];
        assert!(!record::is_dirty(second));
    }

    #[test]
    fn soup_busy_while_running() {
        let (manager, _store, network) = manager();
        network.push_json(200, json!({"totalSize": 0, "done": true, "records": []}));

        let nested = Mutex::new(None);
        manager
            .sync_down(soql(), "accounts", SyncOptions::default(), |state| {
                if state.status() == SyncStatus::Running && nested.lock().is_none() {
                    let result = manager.sync_down(soql(), "accounts", SyncOptions::default(), |_| {});
                    *nested.lock() = Some(result.map(|s| s.id()));
                }
            })
            .unwrap();

        let nested = nested.into_inner().unwrap();
        assert!(matches!(nested, Err(SyncError::SoupBusy { sync_id: Some(_), .. })));
    }

    mod props {
        use crate::manager::running_progress;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn running_progress_is_monotonic_and_below_100(total in 0i64..500, steps in 0usize..600) {
                let mut last = 0;
                for processed in 0..=steps {
                    let progress = running_progress(processed, total);
                    prop_assert!(progress <= 99);
                    prop_assert!(progress >= last);
                    last = progress;
                }
            }
        }
    }
}
