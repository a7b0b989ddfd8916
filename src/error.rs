use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, error, warn};
use serde_json::json;
use thiserror::Error;

/// Failures of a single chat-completion call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("OpenRouter API key is not configured")]
    NotConfigured,

    /// Non-2xx answer; `message` is the upstream error message when it sent one.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("OpenRouter request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OpenRouter returned a malformed response: {0}")]
    Malformed(String),

    #[error("OpenRouter request was cancelled")]
    Cancelled,
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Missing, mistyped or oversized input.
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    RateLimited { message: String, retry_after: u64 },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ToolError::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ToolError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ToolError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ToolError::Gateway(_) | ToolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Missing content type, unreadable body or malformed JSON.
impl From<JsonRejection> for ToolError {
    fn from(rejection: JsonRejection) -> Self {
        ToolError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        match &self {
            ToolError::Gateway(_) | ToolError::Internal(_) => error!("Tool request failed: {:#}", self),
            ToolError::RateLimited { .. } => warn!("Rate limited: {}", self),
            ToolError::BadRequest(_) => debug!("Client error: {}", self),
        }

        let status = self.status_code();
        match self {
            ToolError::RateLimited { message, retry_after } => {
                let mut response = (
                    status,
                    Json(json!({ "error": message, "retryAfter": retry_after })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
