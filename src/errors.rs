use crate::services::{
    drive_service::DriveError, file_tree::TreeError, session_store::SessionError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<TreeError> for AppError {
    fn from(err: TreeError) -> Self {
        let status = match &err {
            TreeError::NotFound(_) => StatusCode::NOT_FOUND,
            TreeError::Conflict { .. } | TreeError::Cycle(_) => StatusCode::CONFLICT,
            TreeError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TreeError::InvalidName { .. } | TreeError::InvalidRule(_) => StatusCode::BAD_REQUEST,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotSignedIn => AppError::new(StatusCode::UNAUTHORIZED, err.to_string()),
            other => {
                tracing::error!("session store failure: {}", other);
                AppError::internal(other.to_string())
            }
        }
    }
}

impl From<DriveError> for AppError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Tree(err) => err.into(),
            DriveError::Session(err) => err.into(),
            DriveError::Io(err) => AppError::bad_request(format!("could not read body: {}", err)),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
