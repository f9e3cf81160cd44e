// Type definitions and error kinds

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The four outcomes a gateway call can fail with.
///
/// Every failure below the HTTP layer is classified into one of these before
/// it reaches a caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("No API key configured")]
    MissingCredential,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Upstream failure ({}): {message}", status_label(.status))]
    UpstreamFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("Model returned content that does not match the expected shape")]
    ParseFailure { raw_text: String },
}

impl GatewayError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        GatewayError::UpstreamFailure {
            status,
            message: message.into(),
        }
    }

    /// Message shown to the end user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            GatewayError::MissingCredential => {
                "AI service key not configured. Please set up your API key to continue."
            }
            GatewayError::RateLimited => {
                "Rate limit exceeded. Please try again in a moment."
            }
            GatewayError::UpstreamFailure { .. } => {
                "AI service temporarily unavailable. Please try again."
            }
            GatewayError::ParseFailure { .. } => {
                "The AI response could not be understood. Please try again."
            }
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "network".to_string(),
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Gateway(GatewayError::MissingCredential) => StatusCode::PRECONDITION_FAILED,
            AppError::Gateway(GatewayError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Gateway(GatewayError::UpstreamFailure { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Gateway(GatewayError::ParseFailure { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Gateway(GatewayError::MissingCredential) => "missing_credential",
            AppError::Gateway(GatewayError::RateLimited) => "rate_limited",
            AppError::Gateway(GatewayError::UpstreamFailure { .. }) => "upstream_failure",
            AppError::Gateway(GatewayError::ParseFailure { .. }) => "parse_failure",
            AppError::Database(_) => "database",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Gateway(e) => e.user_message().to_string(),
            // Storage details stay in the logs
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": self.kind(),
            "message": message,
        });
        (self.status_code(), Json(body)).into_response()
    }
}
