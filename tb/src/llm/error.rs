//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing API key: set the {0} environment variable")]
    MissingApiKey(String),
}

impl LlmError {
    /// Short label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::RateLimited { .. } => "rate_limited",
            LlmError::ApiError { .. } => "api_error",
            LlmError::Network(_) => "network",
            LlmError::InvalidResponse(_) => "invalid_response",
            LlmError::Timeout(_) => "timeout",
            LlmError::Json(_) => "json",
            LlmError::MissingApiKey(_) => "missing_api_key",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(LlmError::Timeout(Duration::from_secs(10)).kind(), "timeout");
        assert_eq!(
            LlmError::ApiError {
                status: 500,
                message: "Server error".to_string()
            }
            .kind(),
            "api_error"
        );
        assert_eq!(LlmError::InvalidResponse("empty".to_string()).kind(), "invalid_response");
    }

    #[test]
    fn test_display_includes_details() {
        let err = LlmError::ApiError {
            status: 401,
            message: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "API error 401: bad key");

        let err = LlmError::MissingApiKey("OPENAI_API_KEY".to_string());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
