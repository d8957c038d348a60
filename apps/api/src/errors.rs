use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required request field was absent or blank.
    #[error("{0}")]
    MissingInput(String),

    /// The scraping oracle was unusable and no pasted text was available.
    #[error("Failed to scrape job description from URL. Please provide the job description text directly.")]
    ScrapeFailed,

    /// The completion service answered without usable content.
    #[error("{0}")]
    EmptyCompletion(String),

    /// Transport or service failure upstream. The message is passed through.
    #[error("{0}")]
    Upstream(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Stable machine-readable kind, used as `error.code` on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingInput(_) => "MISSING_INPUT",
            AppError::ScrapeFailed => "SCRAPE_FAILED",
            AppError::EmptyCompletion(_) => "EMPTY_COMPLETION",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingInput(_) | AppError::ScrapeFailed | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::EmptyCompletion(_) | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// `{"error": {"code", "message"}}` body shared by JSON responses and SSE error events.
    pub fn body(&self) -> Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.to_string()
            }
        })
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::EmptyContent => {
                AppError::EmptyCompletion("The model returned an empty response".to_string())
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::EmptyCompletion(msg) => tracing::warn!("Empty completion: {msg}"),
            AppError::Upstream(msg) => tracing::error!("Upstream error: {msg}"),
            _ => {}
        }

        (self.status(), Json(self.body())).into_response()
    }
}
