use serde_json::json;
use thiserror::Error;

use crate::model::Role;

/// Errors produced by the seating engine and account layer.
#[derive(Debug, Error)]
pub enum SeatingError {
    /// Input had the wrong shape or was out of range.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("seat not found: {seat_id}")]
    SeatNotFound { session_id: String, seat_id: String },

    #[error("user not found")]
    UserNotFound,

    /// Username already taken for this role.
    #[error("{role} `{username}` already exists")]
    DuplicateUser { username: String, role: Role },

    /// Strict roll policy: the roll number is already seated elsewhere in the session.
    #[error("roll number `{roll_no}` is already assigned to seat {seat_id}")]
    DuplicateRoll { roll_no: String, seat_id: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("missing or expired token")]
    Unauthorized,

    #[error("{required} access required")]
    Forbidden { required: Role },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("import failed: {message}")]
    Import { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SeatingError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SeatingError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable error code used in IPC responses.
    pub fn code(&self) -> &'static str {
        match self {
            SeatingError::Validation { .. } => "bad_params",
            SeatingError::SessionNotFound { .. }
            | SeatingError::SeatNotFound { .. }
            | SeatingError::UserNotFound => "not_found",
            SeatingError::DuplicateUser { .. } | SeatingError::DuplicateRoll { .. } => "conflict",
            SeatingError::InvalidCredentials | SeatingError::Unauthorized => "unauthorized",
            SeatingError::Forbidden { .. } => "forbidden",
            SeatingError::Storage { .. } => "db_query_failed",
            SeatingError::Import { .. } => "import_failed",
            SeatingError::Internal { .. } => "internal_error",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SeatingError::Validation { field, .. } => Some(json!({ "field": field })),
            SeatingError::SessionNotFound { session_id } => {
                Some(json!({ "sessionId": session_id }))
            }
            SeatingError::SeatNotFound {
                session_id,
                seat_id,
            } => Some(json!({ "sessionId": session_id, "seatId": seat_id })),
            SeatingError::DuplicateUser { username, role } => {
                Some(json!({ "username": username, "role": role }))
            }
            SeatingError::DuplicateRoll { roll_no, seat_id } => {
                Some(json!({ "rollNo": roll_no, "seatId": seat_id }))
            }
            SeatingError::Forbidden { required } => Some(json!({ "required": required })),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SeatingError {
    fn from(err: rusqlite::Error) -> Self {
        SeatingError::Storage {
            message: err.to_string(),
        }
    }
}

pub type SeatingResult<T> = Result<T, SeatingError>;
