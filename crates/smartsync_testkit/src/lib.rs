//! # SmartSync Testkit
//!
//! Test utilities for SmartSync.
//!
//! This crate provides:
//! - Fixtures wiring a store, the reference server and a sync manager
//! - Property-based test generators using proptest
//! - A convergence harness for local edit plans
//! - Stress runs over concurrent syncs
//! - Persisted-format test vectors
//!
//! ## Usage
//!
//! ```rust
//! use smartsync_testkit::prelude::*;
//!
//! let fixture = scenarios::synced_accounts(5, 2);
//! assert_eq!(fixture.soup_records(ACCOUNTS_SOUP).len(), 5);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
pub use vectors::*;
