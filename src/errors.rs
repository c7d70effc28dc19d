use axum::{http::StatusCode, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure talking to the data store. Callers can tell "no rows" (an empty
/// `Ok`) apart from a backend problem (any of these variants).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("data API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("duplicate key value violates unique constraint on {0}")]
    Conflict(String),

    #[error("unknown table {0}")]
    UnknownTable(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        error!("data store failure: {err}");
        let status = match err {
            StoreError::Transport(_) | StoreError::Status { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: format!("An error occurred: {err}"),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(json!({ "success": false, "message": self.message }));
        (self.status, body).into_response()
    }
}
