//! Error types for the interop layer.

use thiserror::Error;

/// Error returned by connection and statement operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// No platform shim is compiled into this build for the current target.
    /// A deployment error, never retried.
    #[error("no sqlite platform shim is available for this target")]
    Configuration,

    /// The storage layer cannot represent the requested database path.
    /// Raised before any native handle exists.
    #[error("database path {path:?} is not representable on this platform")]
    InvalidPath {
        /// The path as supplied by the caller.
        path: String,
    },

    /// A non-OK status from the native engine, with the connection's error
    /// message when one was available.
    #[error("sqlite error {code}: {message}")]
    Sqlite {
        /// The native status code.
        code: i32,
        /// Human-readable message, usually from `sqlite3_errmsg`.
        message: String,
    },
}

impl Error {
    pub(crate) fn sqlite(code: i32, message: impl Into<String>) -> Self {
        Self::Sqlite {
            code,
            message: message.into(),
        }
    }
}

/// Result type for interop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable failure reported from inside a custom scalar function or
/// aggregate, surfaced to the engine through its error result-set call.
///
/// Panics, by contrast, are unrecoverable: they abort the process rather
/// than silently corrupting a result.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FunctionError {
    message: String,
}

impl FunctionError {
    /// Creates a function error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for FunctionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for FunctionError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
