//! Sync up targets: how local changes reach the server.

use crate::context::RestContext;
use crate::error::{SyncError, SyncResult};
use crate::options::MergeMode;
use crate::record::{self, SyncAction};
use crate::target::registry::TargetRegistry;
use serde_json::{json, Map, Value};
use smartsync_protocol::{
    names, quote_literal, timestamp, CompositeSubrequest, CompositeSubresponse, ProtocolError,
    QueryResponse, RestRequest, SoqlBuilder,
};
use smartsync_store::{QuerySpec, SmartStore, StoreError, SOUP_ENTRY_ID};
use std::collections::HashMap;
use tracing::{debug, warn};

/// How a sync up target talks to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum UpTargetKind {
    /// One REST call per record.
    Rest,
    /// Batches of records per composite call.
    Composite {
        /// Records per composite call, at most 25.
        max_batch_size: usize,
    },
    /// A target implemented outside the engine, resolved by name.
    Custom {
        /// Name the pusher factory is registered under.
        name: String,
        /// Opaque parameters handed to the factory.
        params: Value,
    },
}

/// Describes how a sync up pushes records.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpTarget {
    /// Push strategy.
    pub kind: UpTargetKind,
    /// Field holding the server id.
    pub id_field_name: String,
    /// Field holding the server modification date.
    pub modification_date_field_name: String,
}

/// What happened to one record during a sync up.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Created on the server with this id.
    Created {
        /// Server-assigned id.
        server_id: String,
        /// Server modification date after the create, in epoch ms.
        last_modified_date: Option<i64>,
    },
    /// Updated on the server.
    Updated {
        /// Server modification date after the update, in epoch ms.
        last_modified_date: Option<i64>,
    },
    /// Deleted on the server, or never there.
    Deleted,
    /// Nothing needed pushing; local flags can be cleared.
    Unchanged,
    /// The server copy changed since the last sync down.
    Conflict {
        /// Description of the conflict.
        message: String,
    },
    /// The push failed.
    Failed {
        /// Error message.
        message: String,
    },
}

impl RecordOutcome {
    /// Returns true for [`RecordOutcome::Failed`].
    pub fn is_failure(&self) -> bool {
        matches!(self, RecordOutcome::Failed { .. })
    }
}

/// Per-record server operations.
pub trait RecordPusher: Send + Sync {
    /// Creates a record and returns its server id.
    fn create_on_server(
        &self,
        ctx: &RestContext<'_>,
        object_type: &str,
        fields: Value,
    ) -> SyncResult<Option<String>>;

    /// Updates a record.
    fn update_on_server(
        &self,
        ctx: &RestContext<'_>,
        object_type: &str,
        id: &str,
        fields: Value,
    ) -> SyncResult<()>;

    /// Deletes a record. A record already gone from the server counts as deleted.
    fn delete_on_server(&self, ctx: &RestContext<'_>, object_type: &str, id: &str) -> SyncResult<()>;

    /// Returns the server modification date in epoch ms, `None` if the
    /// record does not exist on the server.
    fn fetch_last_modified_date(
        &self,
        ctx: &RestContext<'_>,
        object_type: &str,
        id: &str,
    ) -> SyncResult<Option<i64>>;
}

/// Batched server operations.
pub trait BatchPusher: Send + Sync {
    /// Maximum number of records per [`BatchPusher::sync_up_records`] call.
    fn max_batch_size(&self) -> usize;

    /// Pushes a batch and returns one outcome per record, in order.
    fn sync_up_records(
        &self,
        ctx: &RestContext<'_>,
        records: &[Value],
        field_list: &[String],
        merge_mode: MergeMode,
        soup_name: &str,
    ) -> SyncResult<Vec<RecordOutcome>>;
}

/// The push behaviour of a target for one run.
pub enum UpHandler {
    /// Record by record.
    Records(Box<dyn RecordPusher>),
    /// Batch by batch.
    Batch(Box<dyn BatchPusher>),
}

impl std::fmt::Debug for UpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpHandler::Records(_) => f.write_str("UpHandler::Records"),
            UpHandler::Batch(pusher) => write!(f, "UpHandler::Batch({})", pusher.max_batch_size()),
        }
    }
}

impl Default for SyncUpTarget {
    fn default() -> Self {
        Self::rest()
    }
}

impl SyncUpTarget {
    fn with_kind(kind: UpTargetKind) -> Self {
        Self {
            kind,
            id_field_name: names::ID.to_string(),
            modification_date_field_name: names::LAST_MODIFIED_DATE.to_string(),
        }
    }

    /// A target pushing one record per REST call.
    pub fn rest() -> Self {
        Self::with_kind(UpTargetKind::Rest)
    }

    /// A target pushing through the composite endpoint.
    pub fn composite(max_batch_size: usize) -> SyncResult<Self> {
        if max_batch_size == 0 || max_batch_size > names::MAX_COMPOSITE_SUBREQUESTS {
            return Err(SyncError::invalid_target(format!(
                "composite batch size must be between 1 and {}, got {max_batch_size}",
                names::MAX_COMPOSITE_SUBREQUESTS
            )));
        }
        Ok(Self::with_kind(UpTargetKind::Composite { max_batch_size }))
    }

    /// A custom target resolved through the [`TargetRegistry`].
    pub fn custom(name: impl Into<String>, params: Value) -> SyncResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SyncError::invalid_target("custom target name must not be empty"));
        }
        Ok(Self::with_kind(UpTargetKind::Custom { name, params }))
    }

    /// Overrides the id field.
    pub fn with_id_field_name(mut self, name: impl Into<String>) -> Self {
        self.id_field_name = name.into();
        self
    }

    /// Overrides the modification date field.
    pub fn with_modification_date_field_name(mut self, name: impl Into<String>) -> Self {
        self.modification_date_field_name = name.into();
        self
    }

    /// Persisted name of the push strategy.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            UpTargetKind::Rest => "rest",
            UpTargetKind::Composite { .. } => "composite",
            UpTargetKind::Custom { .. } => "custom",
        }
    }

    /// Entry ids of the dirty records of `soup`, ascending.
    pub fn get_ids_of_records_to_sync_up(
        &self,
        store: &dyn SmartStore,
        soup: &str,
        page_size: usize,
    ) -> SyncResult<Vec<i64>> {
        let spec = QuerySpec::exact(soup, record::LOCAL, Value::Bool(true), page_size)?;
        let mut ids = Vec::new();
        for page_index in 0.. {
            let page = store.query(&spec, page_index)?;
            let len = page.len();
            for entry in page {
                let id = entry
                    .get(SOUP_ENTRY_ID)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| StoreError::invalid_record("stored record without entry id"))?;
                ids.push(id);
            }
            if len < page_size {
                break;
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Creates the push behaviour for one run.
    pub fn handler(&self, registry: &TargetRegistry) -> SyncResult<UpHandler> {
        Ok(match &self.kind {
            UpTargetKind::Rest => UpHandler::Records(Box::new(RestPusher {
                modification_date_field_name: self.modification_date_field_name.clone(),
            })),
            UpTargetKind::Composite { max_batch_size } => UpHandler::Batch(Box::new(CompositePusher {
                target: self.clone(),
                max_batch_size: *max_batch_size,
            })),
            UpTargetKind::Custom { name, params } => registry.up_handler(name, params)?,
        })
    }

    /// The fields of `record` sent to the server.
    ///
    /// An empty `field_list` sends every non-reserved field. The id and
    /// modification date fields, `SystemModstamp`, store fields, local
    /// flags and `attributes` are never sent.
    pub fn fields_to_push(&self, record: &Value, field_list: &[String]) -> Value {
        let pushable = |name: &str| {
            name != self.id_field_name
                && name != self.modification_date_field_name
                && !names::READ_ONLY_FIELDS.contains(&name)
                && name != names::ATTRIBUTES
                && !name.starts_with("_soup")
                && !(name.starts_with("__") && name.ends_with("__"))
        };

        let mut fields = Map::new();
        match record.as_object() {
            Some(object) if field_list.is_empty() => {
                for (name, value) in object {
                    if pushable(name) {
                        fields.insert(name.clone(), value.clone());
                    }
                }
            }
            Some(object) => {
                for name in field_list.iter().filter(|name| pushable(name)) {
                    if let Some(value) = object.get(name) {
                        fields.insert(name.clone(), value.clone());
                    }
                }
            }
            None => {}
        }
        Value::Object(fields)
    }

    /// Server id of a record, if it has one that is not a local placeholder.
    pub fn server_id<'r>(&self, record: &'r Value) -> Option<&'r str> {
        record
            .get(&self.id_field_name)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty() && !record::is_local_id(id))
    }

    /// Server modification date the record was last synced with.
    pub fn baseline(&self, record: &Value) -> Option<i64> {
        record
            .get(&self.modification_date_field_name)
            .and_then(Value::as_str)
            .and_then(timestamp::parse_millis)
    }

    /// Pushes one record through `pusher`.
    ///
    /// Errors are returned as is; the caller decides whether they concern
    /// only this record.
    pub fn push_record(
        &self,
        pusher: &dyn RecordPusher,
        ctx: &RestContext<'_>,
        record: &Value,
        field_list: &[String],
        merge_mode: MergeMode,
    ) -> SyncResult<RecordOutcome> {
        let action = SyncAction::for_record(record);
        if action == SyncAction::None {
            return Ok(RecordOutcome::Unchanged);
        }
        let Some(object_type) = record::object_type(record) else {
            return Ok(RecordOutcome::Failed {
                message: "record has no attributes.type".into(),
            });
        };

        if action == SyncAction::Create {
            let fields = self.fields_to_push(record, field_list);
            return Ok(match pusher.create_on_server(ctx, object_type, fields)? {
                Some(server_id) => RecordOutcome::Created {
                    last_modified_date: read_back_last_modified_date(pusher, ctx, object_type, &server_id),
                    server_id,
                },
                None => RecordOutcome::Failed {
                    message: "server returned no id".into(),
                },
            });
        }

        let Some(id) = self.server_id(record) else {
            return Ok(RecordOutcome::Failed {
                message: "record has no server id".into(),
            });
        };

        if merge_mode == MergeMode::LeaveIfChanged {
            if let Some(baseline) = self.baseline(record) {
                let server = pusher.fetch_last_modified_date(ctx, object_type, id)?;
                if let Some(outcome) = leave_if_changed(action, baseline, server) {
                    return Ok(outcome);
                }
            }
        }

        match action {
            SyncAction::Update => {
                let fields = self.fields_to_push(record, field_list);
                pusher.update_on_server(ctx, object_type, id, fields)?;
                Ok(RecordOutcome::Updated {
                    last_modified_date: read_back_last_modified_date(pusher, ctx, object_type, id),
                })
            }
            _ => {
                pusher.delete_on_server(ctx, object_type, id)?;
                Ok(RecordOutcome::Deleted)
            }
        }
    }

    /// Encodes the target with its persisted key names.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), Value::from(self.type_name()));
        match &self.kind {
            UpTargetKind::Rest => {}
            UpTargetKind::Composite { max_batch_size } => {
                map.insert("maxBatchSize".into(), json!(max_batch_size));
            }
            UpTargetKind::Custom { name, params } => {
                map.insert("name".into(), Value::from(name.clone()));
                map.insert("params".into(), params.clone());
            }
        }
        map.insert("idFieldName".into(), Value::from(self.id_field_name.clone()));
        map.insert(
            "modificationDateFieldName".into(),
            Value::from(self.modification_date_field_name.clone()),
        );
        Value::Object(map)
    }

    /// Decodes the [`Self::to_json`] form. A missing `type` means `rest`.
    pub fn from_json(json: &Value) -> SyncResult<Self> {
        let text = |key: &str| json.get(key).and_then(Value::as_str).map(str::to_string);

        let mut target = match text("type").as_deref() {
            None | Some("rest") => Self::rest(),
            Some("composite") => {
                let size = json
                    .get("maxBatchSize")
                    .and_then(Value::as_u64)
                    .map_or(names::MAX_COMPOSITE_SUBREQUESTS, |n| n as usize);
                Self::composite(size)?
            }
            Some("custom") => Self::custom(
                text("name").ok_or_else(|| SyncError::invalid_target("custom target without name"))?,
                json.get("params").cloned().unwrap_or(Value::Null),
            )?,
            Some(other) => {
                return Err(SyncError::invalid_target(format!("unknown up target type {other:?}")))
            }
        };
        if let Some(name) = text("idFieldName") {
            target.id_field_name = name;
        }
        if let Some(name) = text("modificationDateFieldName") {
            target.modification_date_field_name = name;
        }
        Ok(target)
    }
}

/// Decides an update or delete under LeaveIfChanged.
///
/// Returns `None` when the push may proceed.
fn leave_if_changed(action: SyncAction, baseline: i64, server: Option<i64>) -> Option<RecordOutcome> {
    match (action, server) {
        (_, Some(server)) if server > baseline => Some(RecordOutcome::Conflict {
            message: format!("record changed on server at {}", timestamp::format_millis(server)),
        }),
        (_, Some(_)) => None,
        (SyncAction::Delete, None) => Some(RecordOutcome::Deleted),
        (_, None) => Some(RecordOutcome::Conflict {
            message: "record no longer exists on server".into(),
        }),
    }
}

/// Reads the server modification date of a record that was just pushed.
///
/// The push already succeeded, so a failed read only loses the new
/// baseline.
fn read_back_last_modified_date(
    pusher: &dyn RecordPusher,
    ctx: &RestContext<'_>,
    object_type: &str,
    id: &str,
) -> Option<i64> {
    pusher
        .fetch_last_modified_date(ctx, object_type, id)
        .unwrap_or_else(|e| {
            warn!(object_type, id, error = %e, "could not read back modification date");
            None
        })
}

/// Pushes records one REST call at a time.
struct RestPusher {
    modification_date_field_name: String,
}

impl RecordPusher for RestPusher {
    fn create_on_server(
        &self,
        ctx: &RestContext<'_>,
        object_type: &str,
        fields: Value,
    ) -> SyncResult<Option<String>> {
        let body = ctx.send_json(RestRequest::for_create(ctx.api_version(), object_type, fields)?)?;
        Ok(body.get(names::LOWER_ID).and_then(Value::as_str).map(str::to_string))
    }

    fn update_on_server(
        &self,
        ctx: &RestContext<'_>,
        object_type: &str,
        id: &str,
        fields: Value,
    ) -> SyncResult<()> {
        ctx.send(RestRequest::for_update(ctx.api_version(), object_type, id, fields)?)?;
        Ok(())
    }

    fn delete_on_server(&self, ctx: &RestContext<'_>, object_type: &str, id: &str) -> SyncResult<()> {
        ctx.send_allowing(RestRequest::for_delete(ctx.api_version(), object_type, id)?, &[404])?;
        Ok(())
    }

    fn fetch_last_modified_date(
        &self,
        ctx: &RestContext<'_>,
        object_type: &str,
        id: &str,
    ) -> SyncResult<Option<i64>> {
        let request = RestRequest::for_retrieve(
            ctx.api_version(),
            object_type,
            id,
            std::slice::from_ref(&self.modification_date_field_name),
        )?;
        let response = ctx.send_allowing(request, &[404])?;
        if response.status == 404 {
            return Ok(None);
        }
        response
            .as_json()
            .get(&self.modification_date_field_name)
            .and_then(Value::as_str)
            .and_then(timestamp::parse_millis)
            .map(Some)
            .ok_or_else(|| {
                ProtocolError::invalid_response(format!(
                    "retrieve response without a valid {}",
                    self.modification_date_field_name
                ))
                .into()
            })
    }
}

/// Pushes records through the composite endpoint.
struct CompositePusher {
    target: SyncUpTarget,
    max_batch_size: usize,
}

impl CompositePusher {
    /// Server modification dates of the given ids, per object type.
    fn server_dates(
        &self,
        ctx: &RestContext<'_>,
        ids_by_type: &HashMap<String, Vec<String>>,
    ) -> SyncResult<HashMap<String, i64>> {
        let id_field = &self.target.id_field_name;
        let date_field = &self.target.modification_date_field_name;
        let mut dates = HashMap::new();
        for (object_type, ids) in ids_by_type {
            let in_list: Vec<String> = ids.iter().map(|id| quote_literal(id)).collect();
            let query = SoqlBuilder::with_fields([id_field.as_str(), date_field.as_str()])
                .from(object_type.as_str())
                .where_clause(format!("{id_field} IN ({})", in_list.join(", ")))
                .build()
                .ok_or_else(|| SyncError::invalid_target("empty conflict query"))?;
            let page = QueryResponse::from_json(&ctx.send_json(RestRequest::for_query(ctx.api_version(), &query)?)?)?;
            for row in page.records {
                let id = row.get(id_field.as_str()).and_then(Value::as_str);
                let ts = row
                    .get(date_field.as_str())
                    .and_then(Value::as_str)
                    .and_then(timestamp::parse_millis);
                if let (Some(id), Some(ts)) = (id, ts) {
                    dates.insert(id.to_string(), ts);
                }
            }
        }
        Ok(dates)
    }

    /// Fills in the server modification dates of created and updated
    /// records. A failed query leaves them unset.
    fn read_back_dates(&self, ctx: &RestContext<'_>, records: &[Value], outcomes: &mut [Option<RecordOutcome>]) {
        let mut pushed_by_type: HashMap<String, Vec<String>> = HashMap::new();
        for (record, outcome) in records.iter().zip(outcomes.iter()) {
            let id = match outcome {
                Some(RecordOutcome::Created { server_id, .. }) => Some(server_id.as_str()),
                Some(RecordOutcome::Updated { .. }) => self.target.server_id(record),
                _ => None,
            };
            if let (Some(object_type), Some(id)) = (record::object_type(record), id) {
                pushed_by_type.entry(object_type.to_string()).or_default().push(id.to_string());
            }
        }
        if pushed_by_type.is_empty() {
            return;
        }

        let dates = match self.server_dates(ctx, &pushed_by_type) {
            Ok(dates) => dates,
            Err(e) => {
                warn!(error = %e, "could not read back modification dates");
                return;
            }
        };
        for (record, outcome) in records.iter().zip(outcomes.iter_mut()) {
            match outcome {
                Some(RecordOutcome::Created {
                    server_id,
                    last_modified_date,
                }) => *last_modified_date = dates.get(server_id.as_str()).copied(),
                Some(RecordOutcome::Updated { last_modified_date }) => {
                    *last_modified_date = self.target.server_id(record).and_then(|id| dates.get(id).copied());
                }
                _ => {}
            }
        }
    }
}

impl BatchPusher for CompositePusher {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn sync_up_records(
        &self,
        ctx: &RestContext<'_>,
        records: &[Value],
        field_list: &[String],
        merge_mode: MergeMode,
        soup_name: &str,
    ) -> SyncResult<Vec<RecordOutcome>> {
        let target = &self.target;
        let mut outcomes: Vec<Option<RecordOutcome>> = vec![None; records.len()];

        // Ids whose server copy must be checked first.
        let mut ids_by_type: HashMap<String, Vec<String>> = HashMap::new();
        if merge_mode == MergeMode::LeaveIfChanged {
            for record in records {
                let action = SyncAction::for_record(record);
                if !matches!(action, SyncAction::Update | SyncAction::Delete)
                    || target.baseline(record).is_none()
                {
                    continue;
                }
                if let (Some(object_type), Some(id)) = (record::object_type(record), target.server_id(record)) {
                    ids_by_type.entry(object_type.to_string()).or_default().push(id.to_string());
                }
            }
        }
        let server_dates = if ids_by_type.is_empty() {
            HashMap::new()
        } else {
            self.server_dates(ctx, &ids_by_type)?
        };

        let mut subrequests = Vec::new();
        let mut pending = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let action = SyncAction::for_record(record);
            if action == SyncAction::None {
                outcomes[index] = Some(RecordOutcome::Unchanged);
                continue;
            }
            let Some(object_type) = record::object_type(record) else {
                outcomes[index] = Some(RecordOutcome::Failed {
                    message: "record has no attributes.type".into(),
                });
                continue;
            };

            let request = if action == SyncAction::Create {
                RestRequest::for_create(
                    ctx.api_version(),
                    object_type,
                    target.fields_to_push(record, field_list),
                )?
            } else {
                let Some(id) = target.server_id(record) else {
                    outcomes[index] = Some(RecordOutcome::Failed {
                        message: "record has no server id".into(),
                    });
                    continue;
                };
                if merge_mode == MergeMode::LeaveIfChanged {
                    if let Some(baseline) = target.baseline(record) {
                        let server = server_dates.get(id).copied();
                        if let Some(outcome) = leave_if_changed(action, baseline, server) {
                            outcomes[index] = Some(outcome);
                            continue;
                        }
                    }
                }
                if action == SyncAction::Update {
                    RestRequest::for_update(
                        ctx.api_version(),
                        object_type,
                        id,
                        target.fields_to_push(record, field_list),
                    )?
                } else {
                    RestRequest::for_delete(ctx.api_version(), object_type, id)?
                }
            };

            subrequests.push(CompositeSubrequest::from_request(request, format!("ref{index}")));
            pending.push((index, action));
        }

        if !subrequests.is_empty() {
            debug!(soup = soup_name, subrequests = subrequests.len(), "sending composite batch");
            let request = RestRequest::for_composite(ctx.api_version(), false, &subrequests)?;
            match ctx.send_json(request) {
                Ok(body) => {
                    let responses: HashMap<String, CompositeSubresponse> =
                        CompositeSubresponse::list_from_json(&body)?
                            .into_iter()
                            .map(|sub| (sub.reference_id.clone(), sub))
                            .collect();
                    for (index, action) in pending {
                        let outcome = match responses.get(&format!("ref{index}")) {
                            None => RecordOutcome::Failed {
                                message: "no subresponse for record".into(),
                            },
                            Some(sub) => subresponse_outcome(action, sub),
                        };
                        outcomes[index] = Some(outcome);
                    }
                    self.read_back_dates(ctx, records, &mut outcomes);
                }
                Err(e) if e.is_record_level() => {
                    let message = e.to_string();
                    for (index, _) in pending {
                        outcomes[index] = Some(RecordOutcome::Failed {
                            message: message.clone(),
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or(RecordOutcome::Failed {
                    message: "record was not pushed".into(),
                })
            })
            .collect())
    }
}

fn subresponse_outcome(action: SyncAction, sub: &CompositeSubresponse) -> RecordOutcome {
    if action == SyncAction::Delete && (sub.is_success() || sub.status == 404) {
        return RecordOutcome::Deleted;
    }
    if !sub.is_success() {
        return RecordOutcome::Failed {
            message: sub.as_response().error_message(),
        };
    }
    match action {
        SyncAction::Create => match sub.body.get(names::LOWER_ID).and_then(Value::as_str) {
            Some(id) => RecordOutcome::Created {
                server_id: id.to_string(),
                last_modified_date: None,
            },
            None => RecordOutcome::Failed {
                message: "server returned no id".into(),
            },
        },
        _ => RecordOutcome::Updated {
            last_modified_date: None,
        },
    }
}
