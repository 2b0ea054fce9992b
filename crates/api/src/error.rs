//! API error handling
//!
//! Consistent JSON error responses across all endpoints.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Structured JSON error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// API error type that converts to JSON responses
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or out-of-range input
    Validation(String),
    /// Missing or invalid caller identity
    Unauthorized(String),
    /// The endpoint is not available to any caller right now
    Forbidden(String),
    /// Resource not found
    NotFound(String),
    /// Lost a concurrent write; safe to retry
    Conflict(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, code, retry_after_secs) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, "validation_error", None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "unauthorized", None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "forbidden", None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "not_found", None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, "conflict", Some(1)),
            ApiError::Database(msg) => {
                error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    "database_error",
                    None,
                )
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "internal_error",
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error,
            code: Some(code.to_string()),
            retry_after_secs,
        };
        (status, Json(body)).into_response()
    }
}

impl From<common::Error> for ApiError {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::Validation(msg) => ApiError::Validation(msg),
            common::Error::NotFound(msg) => ApiError::NotFound(msg),
            common::Error::Conflict(msg) => ApiError::Conflict(msg),
            common::Error::Database(msg) => ApiError::Database(msg),
            common::Error::Config(msg) | common::Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<db::StoreError> for ApiError {
    fn from(err: db::StoreError) -> Self {
        common::Error::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
