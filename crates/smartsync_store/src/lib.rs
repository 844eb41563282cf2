//! # SmartSync Store
//!
//! Local soup store for SmartSync.
//!
//! A store holds named **soups**: collections of schema-less JSON records.
//! Every record written through the store gets two reserved fields:
//!
//! - `_soupEntryId` - store-wide, monotonically assigned entry id
//! - `_soupLastModifiedDate` - epoch milliseconds of the last local write
//!
//! The sync engine only talks to the [`SmartStore`] trait, so any backend
//! providing query/upsert/retrieve/delete/count can be plugged in.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral data
//! - [`FileStore`] - Directory-backed store that survives restarts
//!
//! ## Example
//!
//! ```rust
//! use smartsync_store::{InMemoryStore, IndexSpec, QuerySpec, SmartStore};
//! use serde_json::json;
//!
//! let store = InMemoryStore::new();
//! store.register_soup("accounts", &[IndexSpec::string("Id")]).unwrap();
//! store.upsert("accounts", json!({"Id": "001", "Name": "Acme"})).unwrap();
//!
//! let spec = QuerySpec::exact("accounts", "Id", json!("001"), 10).unwrap();
//! assert_eq!(store.count_query(&spec).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod file;
mod index;
mod memory;
mod query;
mod store;
mod table;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use index::{IndexSpec, IndexType};
pub use memory::InMemoryStore;
pub use query::{compare_values, like_matches, text_matches, Order, QueryKind, QuerySpec};
pub use store::{project, SmartStore, SOUP_ENTRY_ID, SOUP_LAST_MODIFIED_DATE};
