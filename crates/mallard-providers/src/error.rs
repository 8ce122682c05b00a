//! Upstream error types and error-frame classification.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The status endpoint answered without issuing a VQD token.
    #[error("upstream did not issue a vqd token")]
    TokenUnavailable,

    /// The chat endpoint answered with a non-success status.
    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },

    /// Upstream error frame: the conversation hit its length cap.
    #[error("Conversation limit reached")]
    ConversationLimit,

    /// Upstream error frame: too many requests against this token.
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Upstream error frame: the provider timed out internally.
    #[error("Request timeout")]
    Timeout,

    /// Upstream error frame of a kind we do not recognize.
    #[error("Unknown error")]
    Unknown { kind: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("stream error: {0}")]
    Stream(String),
}

impl UpstreamError {
    /// The HTTP status the proxy surface should answer with.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::ConversationLimit | Self::RateLimit => 429,
            Self::Timeout => 504,
            _ => 500,
        }
    }

    /// Transient failures worth another token-fetch attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TokenUnavailable | Self::Network(_) => true,
            Self::Http { status } => *status >= 500,
            _ => false,
        }
    }
}

/// Map an upstream error frame's `type` field to a typed failure.
pub fn classify_error_frame(kind: &str) -> UpstreamError {
    match kind {
        "ERR_CONVERSATION_LIMIT" => UpstreamError::ConversationLimit,
        "ERR_RATELIMIT" => UpstreamError::RateLimit,
        "ERR_TIMEOUT" => UpstreamError::Timeout,
        other => UpstreamError::Unknown {
            kind: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_conversation_limit() {
        let err = classify_error_frame("ERR_CONVERSATION_LIMIT");
        assert!(matches!(err, UpstreamError::ConversationLimit));
        assert_eq!(err.status_hint(), 429);
        assert_eq!(err.to_string(), "Conversation limit reached");
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_error_frame("ERR_RATELIMIT");
        assert!(matches!(err, UpstreamError::RateLimit));
        assert_eq!(err.status_hint(), 429);
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_classify_timeout() {
        let err = classify_error_frame("ERR_TIMEOUT");
        assert!(matches!(err, UpstreamError::Timeout));
        assert_eq!(err.status_hint(), 504);
        assert_eq!(err.to_string(), "Request timeout");
    }

    #[test]
    fn test_classify_unknown_kind() {
        let err = classify_error_frame("ERR_SOMETHING_NEW");
        assert!(matches!(err, UpstreamError::Unknown { .. }));
        assert_eq!(err.status_hint(), 500);
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn test_http_and_token_errors_map_to_500() {
        assert_eq!(UpstreamError::Http { status: 418 }.status_hint(), 500);
        assert_eq!(UpstreamError::TokenUnavailable.status_hint(), 500);
        assert_eq!(UpstreamError::Stream("eof".into()).status_hint(), 500);
    }
}
