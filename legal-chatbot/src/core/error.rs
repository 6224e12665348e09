//! Error types for the HTTP service.
//!
//! [`ApiError`] is the top-level error; every variant maps to one HTTP status and renders
//! as `{"detail": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use graphrag::GraphRagError;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;
use tracing::error;

use crate::extract::ExtractError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("{0}")]
    Unprocessable(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Storage(#[from] StorageError),

    #[error("GraphRAG error: {0}")]
    GraphRag(#[from] GraphRagError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", what, id))
    }

    /// LLM failures arrive as `anyhow::Error` from the client crate.
    pub fn llm(err: anyhow::Error) -> Self {
        ApiError::Llm(format!("{:#}", err))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Llm(_) => StatusCode::BAD_GATEWAY,
            ApiError::GraphRag(e) => match e {
                GraphRagError::GraphNotFound(_) | GraphRagError::NoIndex => StatusCode::NOT_FOUND,
                GraphRagError::NoDocuments | GraphRagError::InsufficientContent { .. } => {
                    StatusCode::BAD_REQUEST
                }
                GraphRagError::AlreadyIndexing(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        ApiError::Unprocessable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Result type for service and handler code; uses [`ApiError`].
pub type Result<T> = std::result::Result<T, ApiError>;
