//! Named factories for custom targets.

use crate::error::{SyncError, SyncResult};
use crate::target::down::DownFetcher;
use crate::target::up::{BatchPusher, RecordPusher, UpHandler};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fetcher from a custom down target's params.
pub type DownFactory = Arc<dyn Fn(&Value) -> SyncResult<Box<dyn DownFetcher>> + Send + Sync>;

/// Builds a per-record pusher from a custom up target's params.
pub type RecordPusherFactory = Arc<dyn Fn(&Value) -> SyncResult<Box<dyn RecordPusher>> + Send + Sync>;

/// Builds a batch pusher from a custom up target's params.
pub type BatchPusherFactory = Arc<dyn Fn(&Value) -> SyncResult<Box<dyn BatchPusher>> + Send + Sync>;

/// Resolves custom targets by name.
///
/// Persisted sync states only carry the name and params of a custom
/// target, so the application registers the same factories on every
/// start before running or resyncing them.
#[derive(Clone, Default)]
pub struct TargetRegistry {
    down: HashMap<String, DownFactory>,
    up: HashMap<String, RecordPusherFactory>,
    batch: HashMap<String, BatchPusherFactory>,
}

impl TargetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom down target.
    pub fn register_down<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> SyncResult<Box<dyn DownFetcher>> + Send + Sync + 'static,
    {
        self.down.insert(name.into(), Arc::new(factory));
    }

    /// Registers a custom up target pushing record by record.
    pub fn register_up<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> SyncResult<Box<dyn RecordPusher>> + Send + Sync + 'static,
    {
        let name = name.into();
        self.batch.remove(&name);
        self.up.insert(name, Arc::new(factory));
    }

    /// Registers a custom up target pushing in batches.
    pub fn register_batch_up<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> SyncResult<Box<dyn BatchPusher>> + Send + Sync + 'static,
    {
        let name = name.into();
        self.up.remove(&name);
        self.batch.insert(name, Arc::new(factory));
    }

    pub(crate) fn down_fetcher(&self, name: &str, params: &Value) -> SyncResult<Box<dyn DownFetcher>> {
        let factory = self
            .down
            .get(name)
            .ok_or_else(|| SyncError::invalid_target(format!("no down target registered as {name:?}")))?;
        factory(params)
    }

    pub(crate) fn up_handler(&self, name: &str, params: &Value) -> SyncResult<UpHandler> {
        if let Some(factory) = self.up.get(name) {
            return factory(params).map(UpHandler::Records);
        }
        if let Some(factory) = self.batch.get(name) {
            return factory(params).map(UpHandler::Batch);
        }
        Err(SyncError::invalid_target(format!("no up target registered as {name:?}")))
    }
}

impl fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut down: Vec<_> = self.down.keys().collect();
        let mut up: Vec<_> = self.up.keys().chain(self.batch.keys()).collect();
        down.sort();
        up.sort();
        f.debug_struct("TargetRegistry")
            .field("down", &down)
            .field("up", &up)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RestContext;
    use crate::options::MergeMode;
    use crate::target::down::{FetchPage, SyncDownTarget};
    use crate::target::up::{RecordOutcome, SyncUpTarget};
    use serde_json::json;

    struct Fixed(Vec<Value>);

    impl DownFetcher for Fixed {
        fn start_fetch(&mut self, _ctx: &RestContext<'_>, _max: i64) -> SyncResult<FetchPage> {
            Ok(FetchPage {
                total_size: self.0.len() as i64,
                records: self.0.clone(),
                next_cursor: None,
            })
        }

        fn continue_fetch(&mut self, _ctx: &RestContext<'_>, _cursor: &str) -> SyncResult<FetchPage> {
            Ok(FetchPage::default())
        }
    }

    struct AcceptAll;

    impl BatchPusher for AcceptAll {
        fn max_batch_size(&self) -> usize {
            3
        }

        fn sync_up_records(
            &self,
            _ctx: &RestContext<'_>,
            records: &[Value],
            _field_list: &[String],
            _merge_mode: MergeMode,
            _soup_name: &str,
        ) -> SyncResult<Vec<RecordOutcome>> {
            Ok(records.iter().map(|_| RecordOutcome::Updated { last_modified_date: None }).collect())
        }
    }

    #[test]
    fn custom_targets_resolve_by_name() {
        let mut registry = TargetRegistry::new();
        registry.register_down("fixed", |params| {
            let count = params["count"].as_u64().unwrap_or(0);
            let records = (0..count).map(|i| json!({"Id": i.to_string()})).collect();
            Ok(Box::new(Fixed(records)) as Box<dyn DownFetcher>)
        });
        registry.register_batch_up("accept", |_| Ok(Box::new(AcceptAll) as Box<dyn BatchPusher>));

        let down = SyncDownTarget::custom("fixed", json!({"count": 2})).unwrap();
        assert!(down.fetcher(&registry).is_ok());

        let up = SyncUpTarget::custom("accept", Value::Null).unwrap();
        match up.handler(&registry).unwrap() {
            UpHandler::Batch(pusher) => assert_eq!(pusher.max_batch_size(), 3),
            other => panic!("unexpected handler {other:?}"),
        }
    }

    #[test]
    fn unknown_names_are_invalid_targets() {
        let registry = TargetRegistry::new();
        let down = SyncDownTarget::custom("missing", Value::Null).unwrap();
        assert!(matches!(down.fetcher(&registry), Err(SyncError::InvalidTarget(_))));

        let up = SyncUpTarget::custom("missing", Value::Null).unwrap();
        assert!(matches!(up.handler(&registry), Err(SyncError::InvalidTarget(_))));
    }

    #[test]
    fn debug_lists_names() {
        let mut registry = TargetRegistry::new();
        registry.register_batch_up("accept", |_| Ok(Box::new(AcceptAll) as Box<dyn BatchPusher>));
        assert!(format!("{registry:?}").contains("accept"));
    }
}
