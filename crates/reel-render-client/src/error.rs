//! Render client error types.

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Render service rate limited the request")]
    RateLimited,

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid unit spec: {0}")]
    InvalidRequest(String),

    #[error("Rejected by content policy: {0}")]
    ContentPolicy(String),

    #[error("Request failed with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn content_policy(msg: impl Into<String>) -> Self {
        Self::ContentPolicy(msg.into())
    }

    /// Transient failures worth another attempt.
    ///
    /// Invalid specs and policy rejections fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RenderError::ServiceUnavailable(_)
                | RenderError::RateLimited
                | RenderError::Timeout(_)
                | RenderError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RenderError::unavailable("502").is_retryable());
        assert!(RenderError::RateLimited.is_retryable());
        assert!(RenderError::Timeout(30).is_retryable());

        assert!(!RenderError::invalid_request("empty prompt").is_retryable());
        assert!(!RenderError::content_policy("violence").is_retryable());
        assert!(!RenderError::Rejected {
            status: 404,
            message: "no such model".to_string()
        }
        .is_retryable());
        assert!(!RenderError::InvalidResponse("missing url".to_string()).is_retryable());
    }
}
