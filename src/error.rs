//! Unified error handling for the API.
//!
//! Uniqueness conflicts never show up here: they are the upsert path,
//! resolved by the database's ON CONFLICT clauses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Payload fails normalization (e.g. missing required name).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Database(e) => classify_db_error(e),
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Constraint violations are the caller's fault; connectivity loss is
/// transient and left to the caller's retry policy (503).
fn classify_db_error(e: &sqlx::Error) -> (StatusCode, String) {
    match e {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "record not found".into()),
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::ForeignKeyViolation => (
                StatusCode::BAD_REQUEST,
                format!(
                    "parent record does not exist ({})",
                    db.constraint().unwrap_or("foreign key")
                ),
            ),
            ErrorKind::NotNullViolation | ErrorKind::CheckViolation => (
                StatusCode::BAD_REQUEST,
                format!(
                    "constraint violation ({})",
                    db.constraint().unwrap_or("not null")
                ),
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "database error".into()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "database unavailable".into(),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "database error".into()),
    }
}
