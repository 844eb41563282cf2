//! Error types for the sync engine.

use smartsync_protocol::ProtocolError;
use smartsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with a non-2xx status.
    #[error("http {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Request building or response decoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A sync target is malformed or unknown.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Sync options are malformed.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Engine configuration is malformed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A persisted sync state could not be decoded.
    #[error("malformed sync state: {0}")]
    MalformedState(String),

    /// No sync state with this id.
    #[error("sync {id} not found")]
    SyncNotFound {
        /// Sync id.
        id: i64,
    },

    /// The sync cannot be re-run.
    #[error("cannot resync {id}: {reason}")]
    InvalidResync {
        /// Sync id.
        id: i64,
        /// Why the resync was refused.
        reason: String,
    },

    /// Another run is active on the same soup.
    #[error("soup {soup} is busy with sync {sync_id:?}")]
    SoupBusy {
        /// Soup name.
        soup: String,
        /// Id of the active sync, once known.
        sync_id: Option<i64>,
    },

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Some records of a sync up could not be pushed.
    #[error("{failed} of {total} records failed to sync up")]
    PartialFailure {
        /// Number of failed records.
        failed: usize,
        /// Number of records attempted.
        total: usize,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates an invalid target error.
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget(message.into())
    }

    /// Creates an invalid options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    /// Creates a malformed state error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedState(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the error concerns one record's server round trip
    /// rather than the run as a whole.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            SyncError::Transport { .. }
                | SyncError::Http { .. }
                | SyncError::Protocol(_)
                | SyncError::Timeout
                | SyncError::NotConnected
        )
    }
}
