//! HTTP error mapping.
//!
//! Every handler returns `Result<_, ApiError>`. Engine errors keep their
//! category so the status code follows the taxonomy, and bodies share the
//! `{success: false, message, error}` envelope the study client reads.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::json;
use study_core::ErrorCategory;
use study_core::StoreError;
use study_core::StudyError;
use thiserror::Error;

use crate::completion::CompletionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Study(#[from] StudyError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("OpenAI request failed")]
    Completion(#[from] CompletionError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Study(err) => match err.category() {
                ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                ErrorCategory::InvalidTask
                | ErrorCategory::InsufficientPool
                | ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::InvalidState | ErrorCategory::Store => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Completion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Study(err) => err.category().as_str(),
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION",
            Self::Completion(_) => "UPSTREAM_ERROR",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Study(StudyError::Store(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "request failed: {self}");
        } else {
            tracing::debug!(code = self.code(), "request rejected: {self}");
        }

        let body = match &self {
            Self::Validation(errors) => json!({
                "success": false,
                "message": "Validation failed",
                "errors": errors,
            }),
            Self::Study(StudyError::Validation { errors }) => json!({
                "success": false,
                "message": "Validation failed",
                "errors": errors,
            }),
            Self::Completion(_) => json!({ "error": "OpenAI request failed" }),
            // Backend details stay in the log.
            Self::Study(StudyError::Store(_)) => json!({
                "success": false,
                "message": "An internal error occurred",
                "error": self.code(),
            }),
            _ => json!({
                "success": false,
                "message": self.to_string(),
                "error": self.code(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
