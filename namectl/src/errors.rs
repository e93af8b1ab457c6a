use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing or oversized input fields
    #[error("{message}")]
    Validation { message: String },

    /// The candidate is currently offered to another caller
    #[error("Username {name} is already reserved")]
    AlreadyReserved { name: String },

    /// The name is already present in the data source
    #[error("Username {name} already exists")]
    AlreadyExists { name: String },

    /// The snapshot cache has not been populated (or was disposed)
    #[error("Username cache is not ready (status: {status})")]
    CacheNotReady { status: String },

    /// A data source reported something impossible for a unique key
    #[error("Inconsistent state: {message}")]
    InconsistentState { message: String },

    /// The data source does not offer this operation
    #[error("{operation} is not supported by {source_name}")]
    Unsupported { operation: String, source_name: String },

    /// A bounded operation ran past its deadline
    #[error("Timed out after {seconds}s while trying to {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// Failure surfaced from the external directory, not retried here
    #[error("Directory error: {0:#}")]
    Directory(anyhow::Error),
}

/// Failure category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    AlreadyReserved,
    AlreadyExists,
    CacheNotReady,
    InconsistentState,
    Unsupported,
    Timeout,
    Directory,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::AlreadyReserved => "already_reserved",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::CacheNotReady => "cache_not_ready",
            ErrorKind::InconsistentState => "inconsistent_state",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Directory => "directory",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::AlreadyReserved { .. } => ErrorKind::AlreadyReserved,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::CacheNotReady { .. } => ErrorKind::CacheNotReady,
            Error::InconsistentState { .. } => ErrorKind::InconsistentState,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Directory(_) => ErrorKind::Directory,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } => message.clone(),
            Error::AlreadyReserved { name } => format!("The username {name} is currently offered to someone else"),
            Error::AlreadyExists { name } => format!("The username {name} is already taken"),
            Error::CacheNotReady { .. } => "Username lookups are temporarily unavailable".to_string(),
            Error::InconsistentState { .. } | Error::Unsupported { .. } => "Internal error".to_string(),
            Error::Timeout { .. } | Error::Directory(_) => "The user directory is unavailable, please retry later".to_string(),
        }
    }

    /// Log at a level matching the severity and build the structured failure body.
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            Error::InconsistentState { .. } | Error::Unsupported { .. } | Error::Directory(_) | Error::Timeout { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::CacheNotReady { .. } => {
                tracing::warn!("Cache error: {}", self);
            }
            Error::AlreadyReserved { .. } | Error::AlreadyExists { .. } => {
                tracing::info!("Conflict error: {}", self);
            }
            Error::Validation { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        ErrorResponse {
            kind: self.kind(),
            message: self.user_message(),
        }
    }
}

/// Structured failure body handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

/// Tagged envelope distinguishing a successful payload from a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ok { payload: T },
    Error { error: ErrorResponse },
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(payload) => Outcome::Ok { payload },
            Err(e) => Outcome::Error { error: e.to_response() },
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
