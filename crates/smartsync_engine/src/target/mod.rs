//! Sync targets.
//!
//! A target is a persisted descriptor (what to fetch, how to push) plus the
//! behaviour created from it for one run: a [`DownFetcher`] for sync down,
//! an [`UpHandler`] for sync up. Custom targets are resolved by name through
//! the [`TargetRegistry`].

mod down;
mod registry;
mod up;

pub use down::{add_filter_for_resync, DownFetcher, DownTargetKind, FetchPage, SyncDownTarget};
pub use registry::{BatchPusherFactory, DownFactory, RecordPusherFactory, TargetRegistry};
pub use up::{BatchPusher, RecordOutcome, RecordPusher, SyncUpTarget, UpHandler, UpTargetKind};
