//! Error types for the reference server.

use smartsync_protocol::RestResponse;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the reference server.
///
/// Every error maps to an HTTP status and a Salesforce-style error code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The query or search could not be parsed.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// The query cursor is unknown or malformed.
    #[error("invalid query locator: {0}")]
    InvalidLocator(String),

    /// Unknown object type.
    #[error("sObject type '{0}' is not supported")]
    UnknownObject(String),

    /// No record with this id.
    #[error("the requested resource does not exist: {object_type}/{id}")]
    NotFound {
        /// Object type.
        object_type: String,
        /// Record id.
        id: String,
    },

    /// No such endpoint.
    #[error("the requested resource does not exist: {0}")]
    UnknownEndpoint(String),

    /// HTTP method not supported by the endpoint.
    #[error("http method '{0}' not allowed")]
    MethodNotAllowed(String),

    /// Authentication failed.
    #[error("session expired or invalid: {0}")]
    NotAuthorized(String),

    /// Failure injected by a test.
    #[error("{message}")]
    Injected {
        /// Status to answer with.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status of the error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::MalformedQuery(_)
            | ServerError::InvalidLocator(_) => 400,
            ServerError::NotAuthorized(_) => 401,
            ServerError::UnknownObject(_)
            | ServerError::NotFound { .. }
            | ServerError::UnknownEndpoint(_) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::Injected { status, .. } => *status,
            ServerError::Internal(_) => 500,
        }
    }

    /// Salesforce-style error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "JSON_PARSER_ERROR",
            ServerError::MalformedQuery(_) => "MALFORMED_QUERY",
            ServerError::InvalidLocator(_) => "INVALID_QUERY_LOCATOR",
            ServerError::UnknownObject(_) => "NOT_FOUND",
            ServerError::NotFound { .. } | ServerError::UnknownEndpoint(_) => "NOT_FOUND",
            ServerError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ServerError::NotAuthorized(_) => "INVALID_SESSION_ID",
            ServerError::Injected { .. } => "INJECTED_FAILURE",
            ServerError::Internal(_) => "UNKNOWN_EXCEPTION",
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// Renders the error as a `[{"message", "errorCode"}]` response.
    pub fn to_response(&self) -> RestResponse {
        RestResponse::error(self.status(), self.error_code(), &self.to_string())
    }
}
