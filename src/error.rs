use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::retry::{RetryClass, Retryable, classify_message};
use crate::validation::FieldError;

pub type StoreResult<T> = Result<T, StoreError>;
pub type AppResult<T> = Result<T, AppError>;

/// SQLSTATE codes PostgreSQL uses while a server is going away or not yet up.
const TRANSIENT_SQLSTATES: [&str; 3] = ["57P01", "57P02", "57P03"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

impl Retryable for StoreError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Unavailable(_) => RetryClass::Transient,
            Self::Database(err) => classify_sqlx(err),
            Self::Migration(sqlx::migrate::MigrateError::Execute(err)) => classify_sqlx(err),
            Self::Migration(err) => classify_message(&err.to_string()),
        }
    }
}

fn classify_sqlx(err: &sqlx::Error) -> RetryClass {
    match err {
        sqlx::Error::Io(io) => io.retry_class(),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => RetryClass::Transient,
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) if TRANSIENT_SQLSTATES.iter().any(|state| *state == code) => {
                RetryClass::Transient
            }
            _ => classify_message(db_err.message()),
        },
        other => classify_message(&other.to_string()),
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

impl AppError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation(errors)
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            Self::Validation(details) => {
                (StatusCode::BAD_REQUEST, "validation failed".to_string(), details)
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, Vec::new()),
            Self::Store(err) => {
                tracing::error!(error = %err, "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database operation failed".to_string(),
                    Vec::new(),
                )
            }
        };

        (status, Json(ErrorBody { error, details })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_store_is_transient() {
        assert!(StoreError::unavailable("pool exhausted").is_transient());
    }

    #[test]
    fn sqlx_pool_and_io_failures_are_transient() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StoreError::from(sqlx::Error::PoolClosed).is_transient());

        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(StoreError::from(sqlx::Error::Io(refused)).is_transient());
    }

    #[test]
    fn row_not_found_is_terminal() {
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn protocol_text_falls_back_to_markers() {
        let err = sqlx::Error::Protocol("Connection terminated by peer".to_string());
        assert!(StoreError::from(err).is_transient());
    }

    #[test]
    fn store_errors_map_to_generic_500() {
        let response = AppError::from(StoreError::unavailable("Connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::invalid_field("rating", "must be between 1 and 5").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
