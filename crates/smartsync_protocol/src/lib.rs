//! # SmartSync Protocol
//!
//! REST wire layer for SmartSync.
//!
//! This crate provides:
//! - `RestRequest` / `RestResponse` and request factories for the query,
//!   search, sobject, recent-items and composite endpoints
//! - Query response decoding (`QueryResponse`, `CompositeSubresponse`)
//! - `SoqlBuilder`, `SoslBuilder` and `SoslReturningBuilder`
//! - Well-known field and key names
//! - Server timestamp parsing and formatting
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod names;
mod request;
mod response;
mod soql;
mod sosl;
pub mod timestamp;

pub use error::{ProtocolError, ProtocolResult};
pub use request::{CompositeSubrequest, RestMethod, RestRequest, SERVICES_DATA};
pub use response::{recent_item_ids, search_records, CompositeSubresponse, QueryResponse, RestResponse};
pub use soql::{quote_literal, SoqlBuilder};
pub use sosl::{escape_search_term, SoslBuilder, SoslReturningBuilder};
