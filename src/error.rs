//! Error types for focus
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (malformed input, unknown ids, bad config)
//! - 3: Blocked by a domain rule (role too low, sacred cap, conflicts, invitation state)
//! - 4: Operation failed (storage unavailable, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the focus CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for focus operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Domain rule blocks (exit code 3)
    #[error("{user} may not {action} on project {project}")]
    Authorization {
        user: String,
        action: String,
        project: String,
    },

    #[error("{user} already has {limit} sacred projects")]
    CapacityExceeded { user: String, limit: usize },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invitation {id} is {status}; cannot {attempted}")]
    State {
        id: String,
        status: String,
        attempted: &'static str,
    },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) | Error::NotFound { .. } | Error::InvalidConfig(_) => {
                exit_codes::USER_ERROR
            }

            Error::Authorization { .. }
            | Error::CapacityExceeded { .. }
            | Error::Conflict(_)
            | Error::State { .. } => exit_codes::POLICY_BLOCKED,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable tag naming the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound { .. } => "not_found",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Authorization { .. } => "authorization",
            Error::CapacityExceeded { .. } => "capacity_exceeded",
            Error::Conflict(_) => "conflict",
            Error::State { .. } => "state",
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => "storage",
        }
    }

    /// Structured fields for machine-readable output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound { kind, id } => Some(serde_json::json!({
                "kind": kind,
                "id": id,
            })),
            Error::Authorization {
                user,
                action,
                project,
            } => Some(serde_json::json!({
                "user": user,
                "action": action,
                "project": project,
            })),
            Error::CapacityExceeded { user, limit } => Some(serde_json::json!({
                "user": user,
                "limit": limit,
            })),
            Error::State {
                id,
                status,
                attempted,
            } => Some(serde_json::json!({
                "invitation": id,
                "status": status,
                "attempted": attempted,
            })),
            Error::Validation(message)
            | Error::InvalidConfig(message)
            | Error::Conflict(message) => Some(serde_json::json!({ "message": message })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.to_string_lossy(),
            })),
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => None,
        }
    }
}

/// Result type alias for focus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
