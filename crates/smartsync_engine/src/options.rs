//! Sync options: merge policy and field list.

use crate::error::{SyncError, SyncResult};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;

/// How incoming data is reconciled with local changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Write without any conflict check.
    #[default]
    None,
    /// Incoming data always wins.
    Overwrite,
    /// Leave records that changed on the other side alone.
    LeaveIfChanged,
}

impl MergeMode {
    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::None => "None",
            MergeMode::Overwrite => "Overwrite",
            MergeMode::LeaveIfChanged => "LeaveIfChanged",
        }
    }

    /// Parses a persisted name.
    pub fn parse(text: &str) -> SyncResult<Self> {
        match text {
            "None" => Ok(MergeMode::None),
            "Overwrite" => Ok(MergeMode::Overwrite),
            "LeaveIfChanged" => Ok(MergeMode::LeaveIfChanged),
            other => Err(SyncError::invalid_options(format!("unknown merge mode {other:?}"))),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of one sync: merge mode plus the fields to sync (empty = all).
///
/// Immutable once built; construction validates the field list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncOptions {
    merge_mode: MergeMode,
    field_list: Vec<String>,
}

impl SyncOptions {
    /// Options for a sync down.
    pub fn for_sync_down(merge_mode: MergeMode) -> Self {
        Self {
            merge_mode,
            field_list: Vec::new(),
        }
    }

    /// Options for a sync up pushing `field_list`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOptions` for blank or duplicate field names.
    pub fn for_sync_up<I, S>(field_list: I, merge_mode: MergeMode) -> SyncResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field_list: Vec<String> = field_list.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for field in &field_list {
            if field.trim().is_empty() {
                return Err(SyncError::invalid_options("field names must not be empty"));
            }
            if !seen.insert(field.as_str()) {
                return Err(SyncError::invalid_options(format!("duplicate field {field:?}")));
            }
        }
        Ok(Self {
            merge_mode,
            field_list,
        })
    }

    /// Returns the merge mode.
    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    /// Returns the field list.
    pub fn field_list(&self) -> &[String] {
        &self.field_list
    }

    /// Encodes as `{"fieldlist": [...], "mergeMode": "..."}`.
    ///
    /// `mergeMode` is omitted for [`MergeMode::None`].
    pub fn to_json(&self) -> Value {
        let mut json = json!({ "fieldlist": self.field_list });
        if self.merge_mode != MergeMode::None {
            json["mergeMode"] = Value::from(self.merge_mode.as_str());
        }
        json
    }

    /// Decodes the [`Self::to_json`] form. Missing keys take defaults.
    pub fn from_json(json: &Value) -> SyncResult<Self> {
        if !json.is_object() {
            return Err(SyncError::invalid_options("options must be a JSON object"));
        }
        let merge_mode = match json.get("mergeMode") {
            None | Some(Value::Null) => MergeMode::None,
            Some(Value::String(name)) => MergeMode::parse(name)?,
            Some(other) => {
                return Err(SyncError::invalid_options(format!("mergeMode is not a string: {other}")))
            }
        };
        let field_list = match json.get("fieldlist") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| SyncError::invalid_options("fieldlist entries must be strings"))
                })
                .collect::<SyncResult<_>>()?,
            Some(_) => return Err(SyncError::invalid_options("fieldlist must be an array")),
        };
        Self::for_sync_up(field_list, merge_mode)
    }
}
