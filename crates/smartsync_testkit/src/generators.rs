//! Property-based test generators using proptest.
//!
//! Provides strategies for generating soups, records, targets and local
//! edit plans that respect the engine's validation rules.

use proptest::prelude::*;
use serde_json::{Map, Value};
use smartsync_engine::{MergeMode, SyncDownTarget, SyncOptions, SyncUpTarget};

/// Field names the server maintains itself.
const SYSTEM_FIELDS: &[&str] = &["Id", "CreatedDate", "LastModifiedDate", "SystemModstamp"];

/// Strategy for generating valid soup names.
pub fn soup_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating custom field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Za-z0-9]{0,11}")
        .expect("Invalid regex")
        .prop_filter("System fields are server-owned", |name| {
            !SYSTEM_FIELDS.contains(&name.as_str())
        })
}

/// Strategy for generating object type names.
pub fn object_type_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Account".to_string()),
        Just("Contact".to_string()),
        Just("Opportunity".to_string()),
        prop::string::string_regex("[A-Z][a-z]{2,10}__c").expect("Invalid regex"),
    ]
}

/// Strategy for generating account names.
pub fn record_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}").expect("Invalid regex")
}

/// Strategy for generating scalar field values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1_000_000i64..1_000_000).prop_map(Value::from),
        "[a-z ]{0,16}".prop_map(Value::from),
    ]
}

/// Strategy for generating the custom fields of a record.
pub fn record_fields_strategy(max_fields: usize) -> impl Strategy<Value = Value> {
    prop::collection::btree_map(field_name_strategy(), scalar_value_strategy(), 0..=max_fields)
        .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<String, Value>>()))
}

/// Strategy for generating merge modes.
pub fn merge_mode_strategy() -> impl Strategy<Value = MergeMode> {
    prop_oneof![
        Just(MergeMode::None),
        Just(MergeMode::Overwrite),
        Just(MergeMode::LeaveIfChanged),
    ]
}

/// Strategy for generating sync options with distinct field names.
pub fn sync_options_strategy() -> impl Strategy<Value = SyncOptions> {
    (
        prop::collection::btree_set(field_name_strategy(), 0..5),
        merge_mode_strategy(),
    )
        .prop_map(|(fields, mode)| SyncOptions::for_sync_up(fields, mode).expect("Distinct field names"))
}

/// Strategy for generating sync down targets of every built-in kind.
pub fn sync_down_target_strategy() -> impl Strategy<Value = SyncDownTarget> {
    let fields = || prop::collection::btree_set(field_name_strategy(), 1..4);
    prop_oneof![
        (object_type_strategy(), fields()).prop_map(|(object_type, fields)| {
            let list: Vec<String> = fields.into_iter().collect();
            SyncDownTarget::soql(format!("select Id, {} from {object_type}", list.join(", ")))
                .expect("Valid query")
        }),
        (record_name_strategy(), object_type_strategy()).prop_map(|(term, object_type)| {
            SyncDownTarget::sosl(format!("find {{{}}} returning {object_type}(Id)", term.trim()))
                .expect("Valid search")
        }),
        (object_type_strategy(), fields()).prop_map(|(object_type, fields)| {
            SyncDownTarget::mru(object_type, fields).expect("Valid mru target")
        }),
    ]
}

/// Strategy for generating sync up targets.
pub fn sync_up_target_strategy() -> impl Strategy<Value = SyncUpTarget> {
    prop_oneof![
        Just(SyncUpTarget::rest()),
        (1usize..=25).prop_map(|size| SyncUpTarget::composite(size).expect("Valid batch size")),
    ]
}

/// A local change to apply before a sync up.
#[derive(Debug, Clone)]
pub enum LocalEdit {
    /// Rename a synced record.
    Update {
        /// Position among the live synced records (taken modulo their count).
        index: usize,
        /// New name.
        name: String,
    },
    /// Delete a synced record.
    Delete {
        /// Position among the live synced records (taken modulo their count).
        index: usize,
    },
    /// Create a record.
    Create {
        /// Name of the new record.
        name: String,
    },
    /// Create a record and delete it before it is ever synced.
    CreateThenDelete {
        /// Name of the short-lived record.
        name: String,
    },
}

/// Strategy for generating a local edit.
pub fn local_edit_strategy() -> impl Strategy<Value = LocalEdit> {
    prop_oneof![
        4 => (any::<usize>(), record_name_strategy())
            .prop_map(|(index, name)| LocalEdit::Update { index, name }),
        2 => any::<usize>().prop_map(|index| LocalEdit::Delete { index }),
        2 => record_name_strategy().prop_map(|name| LocalEdit::Create { name }),
        1 => record_name_strategy().prop_map(|name| LocalEdit::CreateThenDelete { name }),
    ]
}

/// Strategy for generating a sequence of local edits.
pub fn edit_plan_strategy(min_edits: usize, max_edits: usize) -> impl Strategy<Value = Vec<LocalEdit>> {
    prop::collection::vec(local_edit_strategy(), min_edits..max_edits)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartsync_engine::SyncState;
    use smartsync_store::InMemoryStore;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn field_names_are_pushable(name in field_name_strategy()) {
            prop_assert!(name.starts_with(|c: char| c.is_ascii_uppercase()));
            prop_assert!(!SYSTEM_FIELDS.contains(&name.as_str()));
        }

        #[test]
        fn record_fields_are_objects(fields in record_fields_strategy(6)) {
            let map = fields.as_object().unwrap();
            prop_assert!(map.len() <= 6);
            prop_assert!(map.values().all(|v| !v.is_object() && !v.is_array()));
        }

        #[test]
        fn persisted_sync_downs_decode_to_the_same_state(
            target in sync_down_target_strategy(),
            mode in merge_mode_strategy(),
            soup in soup_name_strategy(),
        ) {
            let store = InMemoryStore::new();
            let state = SyncState::create_sync_down(&store, target, SyncOptions::for_sync_down(mode), &soup).unwrap();
            let loaded = SyncState::by_id(&store, state.id()).unwrap().unwrap();
            prop_assert_eq!(loaded, state);
        }

        #[test]
        fn persisted_sync_ups_decode_to_the_same_state(
            target in sync_up_target_strategy(),
            options in sync_options_strategy(),
            soup in soup_name_strategy(),
        ) {
            let store = InMemoryStore::new();
            let state = SyncState::create_sync_up(&store, target, options, &soup).unwrap();
            let decoded = SyncState::from_json(&state.to_json()).unwrap();
            prop_assert_eq!(decoded, state);
        }
    }
}
