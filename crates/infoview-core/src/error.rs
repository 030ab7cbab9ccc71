//! Error types for the info view engine.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Failures reported by the backend analysis server for a query.
pub enum BackendError {
    #[error("backend request failed: {message}")]
    /// The backend answered with an error response.
    Request {
        /// Error message returned by the backend.
        message: String,
    },

    #[error("backend connection is closed")]
    /// The request could not be delivered.
    Disconnected,

    #[error("backend request timed out")]
    /// The backend did not answer in time.
    Timeout,
}

#[derive(Debug, Error)]
/// Errors produced by the engine and its command layer.
pub enum InfoviewError {
    #[error(transparent)]
    /// A goal-state fetch failed.
    Backend(#[from] BackendError),

    #[error("unknown command: {0}")]
    /// A command id or command URI did not name a known command.
    UnknownCommand(String),

    #[error("invalid arguments for {command}: {message}")]
    /// A known command was invoked with arguments of the wrong shape.
    InvalidCommandArgs {
        /// The command id.
        command: String,
        /// What was wrong with the arguments.
        message: String,
    },

    #[error("JSON error: {0}")]
    /// Encoding or decoding a protocol message failed.
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout `infoview-core`.
pub type Result<T, E = InfoviewError> = std::result::Result<T, E>;
