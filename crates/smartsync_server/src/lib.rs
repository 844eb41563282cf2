//! # SmartSync Server
//!
//! In-process reference REST server for SmartSync.
//!
//! This crate provides:
//! - Query endpoints with server-side cursors (`query`, `query/{locator}`)
//! - SOSL search and object metadata with recently viewed items
//! - Record create, retrieve, update and delete
//! - Composite calls with optional all-or-none rollback
//! - Authentication (HMAC-SHA256 bearer tokens)
//! - Failure injection for tests
//!
//! # Architecture
//!
//! Records live in memory, per object type. Every write stamps
//! `LastModifiedDate` and `SystemModstamp` from a logical clock, so the
//! sync engine's time stamp checkpoints and conflict checks can be driven
//! deterministically.
//!
//! # Authentication
//!
//! Authentication is optional:
//!
//! ```rust
//! use smartsync_protocol::{RestMethod, RestRequest};
//! use smartsync_server::{ServerConfig, SyncServer};
//!
//! let config = ServerConfig::default().with_auth(b"my-secure-secret-32-bytes-long!".to_vec());
//! let server = SyncServer::new(config);
//! let token = server.create_token("integration.user").unwrap();
//!
//! let request = RestRequest::new(RestMethod::Get, "/services/data/v60.0/sobjects")
//!     .with_header("Authorization", format!("Bearer {token}"));
//! assert_eq!(server.handle(&request).status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod objects;
mod query;
mod server;

pub use auth::{AuthConfig, TokenValidator};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use objects::ObjectTable;
pub use query::{like, CompareOp, Condition, Literal, OrderItem, ReturningSpec, SoqlQuery, SoslSearch};
pub use server::SyncServer;
