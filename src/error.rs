//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Prefix used by the schema triggers when they abort a write against an
/// immutable table.
pub const IMMUTABLE_PREFIX: &str = "immutable:";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict of interest: {0}")]
    ConflictOfInterest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Immutable resource: {0}")]
    ImmutableResource(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if let Some(what) = db_err.message().strip_prefix(IMMUTABLE_PREFIX) {
                return AppError::ImmutableResource(what.trim().to_string());
            }
        }
        AppError::Database(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Migrate(e) => {
                tracing::error!("Migration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e.clone()),
            AppError::Unauthenticated(e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::Unauthorized(e) => (StatusCode::FORBIDDEN, e.clone()),
            AppError::InvalidState(e) => (StatusCode::CONFLICT, e.clone()),
            AppError::ConflictOfInterest(e) => {
                (StatusCode::FORBIDDEN, format!("Conflict of interest: {}", e))
            }
            AppError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.clone()),
            AppError::ImmutableResource(e) => {
                (StatusCode::CONFLICT, format!("Immutable resource: {}", e))
            }
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.clone())
            }
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
