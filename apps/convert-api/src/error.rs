//! Error types for the conversion API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use convert_core::{ConvertError, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unreadable document: {0}")]
    UnreadableDocument(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::InvalidRange(_) => (StatusCode::BAD_REQUEST, "INVALID_RANGE"),
            ServerError::InvalidOption(_) => (StatusCode::BAD_REQUEST, "INVALID_OPTION"),
            ServerError::UnsupportedFormat(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
            }
            ServerError::UnreadableDocument(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNREADABLE_DOCUMENT")
            }
            ServerError::FileNotFound(_) => (StatusCode::NOT_FOUND, "FILE_NOT_FOUND"),
            ServerError::OperationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "OPERATION_FAILED")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConvertError> for ServerError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::InvalidRange(msg) => ServerError::InvalidRange(msg),
            ConvertError::MissingOption(name) => {
                ServerError::InvalidOption(format!("missing required option '{}'", name))
            }
            ConvertError::InvalidOption(msg) => ServerError::InvalidOption(msg),
            ConvertError::Unsupported(msg) => ServerError::UnsupportedFormat(msg),
            ConvertError::ParseError(msg) => ServerError::UnreadableDocument(msg),
            ConvertError::OperationError(msg) => ServerError::OperationFailed(msg),
            ConvertError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) | StoreError::InvalidId(id) => ServerError::FileNotFound(id),
            StoreError::Io(e) => ServerError::Internal(format!("storage failure: {}", e)),
        }
    }
}
