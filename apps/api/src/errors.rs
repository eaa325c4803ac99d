use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::summary::SummaryError;
use crate::system_prompts::PromptStoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PromptStoreError> for AppError {
    fn from(e: PromptStoreError) -> Self {
        match e {
            PromptStoreError::NotFound(name) => {
                AppError::NotFound(format!("System prompt '{name}' not found"))
            }
            PromptStoreError::Validation(msg) => AppError::Validation(msg),
            PromptStoreError::AlreadyExists(name) => {
                AppError::Conflict(format!("System prompt '{name}' already exists"))
            }
            PromptStoreError::Protected => AppError::Validation(e.to_string()),
            PromptStoreError::Storage(_) | PromptStoreError::HistoryFolder(_) => {
                AppError::Internal(e.into())
            }
        }
    }
}

impl From<SummaryError> for AppError {
    fn from(e: SummaryError) -> Self {
        match e {
            SummaryError::InvalidInput(msg) => AppError::Validation(msg),
            SummaryError::ModelUnavailable(model) => AppError::ModelUnavailable(model),
            SummaryError::Llm(e) => AppError::Llm(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::ModelUnavailable(model) => (
                StatusCode::BAD_REQUEST,
                "MODEL_UNAVAILABLE",
                format!("Model '{model}' is not available, refresh the model list"),
            ),
            AppError::Llm(LlmError::RateLimited { retries }) => {
                tracing::error!("LLM rate limited after {retries} retries");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    "The model is busy, please retry shortly".to_string(),
                )
            }
            AppError::Llm(LlmError::MissingCredentials) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MISSING_CREDENTIALS",
                "Model credentials are not configured".to_string(),
            ),
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
