//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The persisted store could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The soup has not been registered.
    #[error("soup not found: {name}")]
    SoupNotFound {
        /// Name of the soup.
        name: String,
    },

    /// No entry with this id exists in the soup.
    #[error("entry {id} not found in soup {soup}")]
    EntryNotFound {
        /// Name of the soup.
        soup: String,
        /// Soup entry id.
        id: i64,
    },

    /// Records must be JSON objects.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// The query spec is malformed.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// More than one entry matched an external id during upsert.
    #[error("external id {value} matches {count} entries in soup {soup}")]
    DuplicateExternalId {
        /// Name of the soup.
        soup: String,
        /// External id value.
        value: String,
        /// Number of matching entries.
        count: usize,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,
}

impl StoreError {
    /// Creates a soup not found error.
    pub fn soup_not_found(name: impl Into<String>) -> Self {
        Self::SoupNotFound { name: name.into() }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }
}
