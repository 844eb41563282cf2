//! Persisted sync state and its state machine.

use crate::error::{SyncError, SyncResult};
use crate::options::{MergeMode, SyncOptions};
use crate::target::{SyncDownTarget, SyncUpTarget};
use serde_json::{json, Value};
use smartsync_store::{IndexSpec, QuerySpec, SmartStore, SOUP_ENTRY_ID};
use std::fmt;

/// Soup holding every sync state.
pub const SYNCS_SOUP: &str = "syncs_soup";

/// Direction of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncType {
    /// Server to store.
    SyncDown,
    /// Store to server.
    SyncUp,
}

impl SyncType {
    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::SyncDown => "SyncDown",
            SyncType::SyncUp => "SyncUp",
        }
    }

    /// Parses a persisted name.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "SyncDown" => Some(SyncType::SyncDown),
            "SyncUp" => Some(SyncType::SyncUp),
            _ => None,
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Created, never run.
    New,
    /// A run is in progress.
    Running,
    /// The last run completed.
    Done,
    /// The last run failed.
    Failed,
}

impl SyncStatus {
    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::New => "New",
            SyncStatus::Running => "Running",
            SyncStatus::Done => "Done",
            SyncStatus::Failed => "Failed",
        }
    }

    /// Parses a persisted name.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "New" => Some(SyncStatus::New),
            "Running" => Some(SyncStatus::Running),
            "Done" => Some(SyncStatus::Done),
            "Failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    /// Returns true for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Done | SyncStatus::Failed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The target of a sync, matching its [`SyncType`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncTarget {
    /// Target of a sync down.
    Down(SyncDownTarget),
    /// Target of a sync up.
    Up(SyncUpTarget),
}

impl SyncTarget {
    fn to_json(&self) -> Value {
        match self {
            SyncTarget::Down(target) => target.to_json(),
            SyncTarget::Up(target) => target.to_json(),
        }
    }
}

/// The persisted record of one sync and its latest run.
///
/// Status moves `New -> Running -> {Done | Failed}`; a terminal state only
/// goes back to `Running` through [`SyncState::restart`]. Within a run the
/// progress never decreases and the total size is set once.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    id: i64,
    sync_type: SyncType,
    target: SyncTarget,
    options: SyncOptions,
    soup_name: String,
    status: SyncStatus,
    progress: u8,
    total_size: i64,
    max_time_stamp: i64,
    error: Option<String>,
    total_size_known: bool,
}

/// Registers [`SYNCS_SOUP`] if needed.
pub fn setup_syncs_soup(store: &dyn SmartStore) -> SyncResult<()> {
    store.register_soup(SYNCS_SOUP, &[IndexSpec::string("type")])?;
    Ok(())
}

impl SyncState {
    fn new(target: SyncTarget, options: SyncOptions, soup_name: &str) -> SyncResult<Self> {
        if soup_name.trim().is_empty() {
            return Err(SyncError::invalid_options("soup name must not be empty"));
        }
        let sync_type = match target {
            SyncTarget::Down(_) => SyncType::SyncDown,
            SyncTarget::Up(_) => SyncType::SyncUp,
        };
        Ok(Self {
            id: -1,
            sync_type,
            target,
            options,
            soup_name: soup_name.to_string(),
            status: SyncStatus::New,
            progress: 0,
            total_size: -1,
            max_time_stamp: -1,
            error: None,
            total_size_known: false,
        })
    }

    fn insert(mut self, store: &dyn SmartStore) -> SyncResult<Self> {
        setup_syncs_soup(store)?;
        let saved = store.upsert(SYNCS_SOUP, self.to_json())?;
        self.id = saved
            .get(SOUP_ENTRY_ID)
            .and_then(Value::as_i64)
            .ok_or_else(|| SyncError::malformed("store returned no entry id"))?;
        self.save(store)?;
        Ok(self)
    }

    /// Creates and persists a `New` sync down.
    pub fn create_sync_down(
        store: &dyn SmartStore,
        target: SyncDownTarget,
        options: SyncOptions,
        soup_name: &str,
    ) -> SyncResult<Self> {
        Self::new(SyncTarget::Down(target), options, soup_name)?.insert(store)
    }

    /// Creates and persists a `New` sync up.
    pub fn create_sync_up(
        store: &dyn SmartStore,
        target: SyncUpTarget,
        options: SyncOptions,
        soup_name: &str,
    ) -> SyncResult<Self> {
        Self::new(SyncTarget::Up(target), options, soup_name)?.insert(store)
    }

    /// Loads a sync by id.
    pub fn by_id(store: &dyn SmartStore, id: i64) -> SyncResult<Option<Self>> {
        if !store.has_soup(SYNCS_SOUP) {
            return Ok(None);
        }
        store
            .retrieve(SYNCS_SOUP, &[id])?
            .first()
            .map(Self::from_json)
            .transpose()
    }

    /// Loads every persisted sync, ordered by id.
    pub fn all(store: &dyn SmartStore) -> SyncResult<Vec<Self>> {
        if !store.has_soup(SYNCS_SOUP) {
            return Ok(Vec::new());
        }
        let page_size = 500;
        let spec = QuerySpec::all(SYNCS_SOUP, page_size)?;
        let mut states = Vec::new();
        for page_index in 0.. {
            let page = store.query(&spec, page_index)?;
            let len = page.len();
            for json in &page {
                states.push(Self::from_json(json)?);
            }
            if len < page_size {
                break;
            }
        }
        Ok(states)
    }

    /// Writes the state to the store.
    pub fn save(&self, store: &dyn SmartStore) -> SyncResult<()> {
        if self.id <= 0 {
            return Err(SyncError::malformed("cannot save a sync without id"));
        }
        store.update(SYNCS_SOUP, self.to_json(), self.id)?;
        Ok(())
    }

    /// Sync id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Direction.
    pub fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    /// Target.
    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// The down target, for a sync down.
    pub fn down_target(&self) -> Option<&SyncDownTarget> {
        match &self.target {
            SyncTarget::Down(target) => Some(target),
            SyncTarget::Up(_) => None,
        }
    }

    /// The up target, for a sync up.
    pub fn up_target(&self) -> Option<&SyncUpTarget> {
        match &self.target {
            SyncTarget::Up(target) => Some(target),
            SyncTarget::Down(_) => None,
        }
    }

    /// Options.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Merge mode of the options.
    pub fn merge_mode(&self) -> MergeMode {
        self.options.merge_mode()
    }

    /// Soup the sync reads or writes.
    pub fn soup_name(&self) -> &str {
        &self.soup_name
    }

    /// Status.
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Progress of the current or last run, 0 to 100.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Total records of the current or last run, `-1` when unknown.
    pub fn total_size(&self) -> i64 {
        self.total_size
    }

    /// Latest server modification time stored by this sync, `-1` if none.
    pub fn max_time_stamp(&self) -> i64 {
        self.max_time_stamp
    }

    /// Error of the last failed run.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn invalid(&self, to: &str) -> SyncError {
        SyncError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    fn require_running(&self, to: &str) -> SyncResult<()> {
        if self.status != SyncStatus::Running {
            return Err(self.invalid(to));
        }
        Ok(())
    }

    /// `New -> Running`. A running sync stays running.
    pub fn start(&mut self) -> SyncResult<()> {
        match self.status {
            SyncStatus::New | SyncStatus::Running => {
                self.status = SyncStatus::Running;
                Ok(())
            }
            _ => Err(self.invalid("Running")),
        }
    }

    /// `Done | Failed -> Running`, starting a new run on the same id.
    ///
    /// Progress, total size and error are reset; the time stamp checkpoint
    /// is kept.
    pub fn restart(&mut self) -> SyncResult<()> {
        if !self.status.is_terminal() {
            return Err(self.invalid("Running"));
        }
        self.status = SyncStatus::Running;
        self.progress = 0;
        self.total_size = -1;
        self.total_size_known = false;
        self.error = None;
        Ok(())
    }

    /// Raises the progress; lower values are ignored.
    pub fn set_progress(&mut self, progress: u8) -> SyncResult<()> {
        self.require_running("progress")?;
        self.progress = self.progress.max(progress.min(100));
        Ok(())
    }

    /// Sets the total size of the current run. Only the first call per run
    /// is accepted.
    pub fn set_total_size(&mut self, total_size: i64) -> SyncResult<()> {
        self.require_running("total size")?;
        if self.total_size_known {
            return Err(self.invalid("total size reset"));
        }
        self.total_size = total_size;
        self.total_size_known = true;
        Ok(())
    }

    /// Raises the time stamp checkpoint; lower values are ignored.
    pub fn advance_max_time_stamp(&mut self, time_stamp: i64) {
        self.max_time_stamp = self.max_time_stamp.max(time_stamp);
    }

    /// `Running -> Done` with progress 100.
    pub fn finish(&mut self) -> SyncResult<()> {
        self.require_running("Done")?;
        self.status = SyncStatus::Done;
        self.progress = 100;
        Ok(())
    }

    /// `New | Running -> Failed`.
    pub fn fail(&mut self, error: impl Into<String>) -> SyncResult<()> {
        match self.status {
            SyncStatus::New | SyncStatus::Running => {
                self.status = SyncStatus::Failed;
                self.error = Some(error.into());
                Ok(())
            }
            _ => Err(self.invalid("Failed")),
        }
    }

    /// Encodes the state with its persisted key names.
    pub fn to_json(&self) -> Value {
        let mut json = json!({
            "id": self.id,
            "type": self.sync_type.as_str(),
            "target": self.target.to_json(),
            "options": self.options.to_json(),
            "soupName": self.soup_name,
            "status": self.status.as_str(),
            "progress": self.progress,
            "totalSize": self.total_size,
            "maxTimeStamp": self.max_time_stamp,
            "mergeMode": self.merge_mode().as_str(),
        });
        if self.id > 0 {
            json[SOUP_ENTRY_ID] = Value::from(self.id);
        }
        if let Some(error) = &self.error {
            json["error"] = Value::from(error.clone());
        }
        json
    }

    /// Decodes a persisted state.
    pub fn from_json(json: &Value) -> SyncResult<Self> {
        let text = |key: &str| {
            json.get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| SyncError::malformed(format!("missing {key}")))
        };
        let int = |key: &str| {
            json.get(key)
                .and_then(Value::as_i64)
                .ok_or_else(|| SyncError::malformed(format!("missing {key}")))
        };

        let id = json
            .get(SOUP_ENTRY_ID)
            .and_then(Value::as_i64)
            .map_or_else(|| int("id"), Ok)?;
        let sync_type = SyncType::parse(text("type")?)
            .ok_or_else(|| SyncError::malformed(format!("unknown type {:?}", json["type"])))?;
        let target_json = json
            .get("target")
            .ok_or_else(|| SyncError::malformed("missing target"))?;
        let target = match sync_type {
            SyncType::SyncDown => SyncTarget::Down(SyncDownTarget::from_json(target_json)?),
            SyncType::SyncUp => SyncTarget::Up(SyncUpTarget::from_json(target_json)?),
        };
        let options = SyncOptions::from_json(json.get("options").unwrap_or(&json!({})))?;
        let status = SyncStatus::parse(text("status")?)
            .ok_or_else(|| SyncError::malformed(format!("unknown status {:?}", json["status"])))?;
        let progress = int("progress")?;
        if !(0..=100).contains(&progress) {
            return Err(SyncError::malformed(format!("progress out of range: {progress}")));
        }
        let total_size = int("totalSize")?;

        Ok(Self {
            id,
            sync_type,
            target,
            options,
            soup_name: text("soupName")?.to_string(),
            status,
            progress: progress as u8,
            total_size,
            max_time_stamp: int("maxTimeStamp")?,
            error: json.get("error").and_then(Value::as_str).map(str::to_string),
            total_size_known: status == SyncStatus::Running && total_size >= 0,
        })
    }
}
