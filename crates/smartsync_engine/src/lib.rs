//! # SmartSync Engine
//!
//! Sync state machine, targets and sync manager for SmartSync.
//!
//! This crate provides:
//! - Persisted sync states (`New -> Running -> Done | Failed`)
//! - Sync down targets (SOQL, SOSL, MRU, custom) with time stamp checkpoints
//! - Sync up targets (per-record REST, composite batches, custom)
//! - Merge modes for reconciling server data with local changes
//! - A sync manager with per-soup exclusion, progress callbacks and cancellation
//! - Retry with exponential backoff
//! - HTTP client abstraction
//!
//! ## Architecture
//!
//! A sync is a [`SyncState`] stored in the `syncs_soup` of the local
//! [`smartsync_store::SmartStore`]. The [`SyncManager`] runs it:
//! 1. Sync down fetches pages from the target and merges them into the soup
//! 2. Sync up pushes the soup's dirty records, one record or batch at a time
//! 3. Every page, record or batch is followed by a persisted state update
//!
//! ## Key Invariants
//!
//! - At most one active run per soup
//! - Progress never decreases within a run and is 100 exactly when `Done`
//! - The time stamp checkpoint never decreases
//! - A record that fails to sync up stays dirty; the others stay committed

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod http;
mod manager;
mod network;
mod options;
pub mod record;
mod state;
mod target;

pub use config::{RetryConfig, SyncConfig, DEFAULT_API_VERSION, DEFAULT_PAGE_SIZE};
pub use context::RestContext;
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpReply, HttpRequest, LoopbackClient, LoopbackServer, RestClient};
pub use manager::SyncManager;
pub use network::{MockNetwork, NetworkClient};
pub use options::{MergeMode, SyncOptions};
pub use record::SyncAction;
pub use state::{setup_syncs_soup, SyncState, SyncStatus, SyncTarget, SyncType, SYNCS_SOUP};
pub use target::{
    add_filter_for_resync, BatchPusher, BatchPusherFactory, DownFactory, DownFetcher, DownTargetKind,
    FetchPage, RecordOutcome, RecordPusher, RecordPusherFactory, SyncDownTarget, SyncUpTarget,
    TargetRegistry, UpHandler, UpTargetKind,
};
