//! Error types for the study artifacts server

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::CacheError;
use crate::generation::GenerationError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// The document does not exist or belongs to another user
    #[error("Document not found or access denied: {0}")]
    NotFoundOrForbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(#[from] GenerationError),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFoundOrForbidden(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Document not found or access denied".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            AppError::GenerationUnavailable(e) => {
                tracing::warn!("Generation unavailable: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "generation_unavailable",
                    "The generation service is unavailable, please retry later".to_string(),
                )
            }
            AppError::GenerationTimeout(budget) => {
                tracing::warn!("Generation timed out after {:?}", budget);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "generation_timeout",
                    "Generation took too long, please retry later".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            AppError::Cache(e) => {
                tracing::error!("Cache error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "cache_error",
                    "Artifact cache error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
