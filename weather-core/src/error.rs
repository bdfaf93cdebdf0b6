//! Provider error taxonomy.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("weather provider rate limit exceeded")]
    RateLimited,

    #[error("weather provider rejected the API key")]
    Unauthorized,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Payload-free discriminant of [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    RateLimited,
    Unauthorized,
    NetworkFailure,
    MalformedResponse,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::NetworkFailure => "network_failure",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::RateLimited => ProviderErrorKind::RateLimited,
            Self::Unauthorized => ProviderErrorKind::Unauthorized,
            Self::NetworkFailure(_) => ProviderErrorKind::NetworkFailure,
            Self::MalformedResponse(_) => ProviderErrorKind::MalformedResponse,
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ProviderErrorKind::RateLimited => {
                "Too many weather requests. Please wait a moment and retry.".to_string()
            }
            ProviderErrorKind::Unauthorized => {
                "The weather service rejected the API key. Check your configuration.".to_string()
            }
            ProviderErrorKind::NetworkFailure => {
                "Could not reach the weather service. Check your connection and retry.".to_string()
            }
            ProviderErrorKind::MalformedResponse => {
                "The weather service returned unexpected data. Please retry later.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strips_payload() {
        assert_eq!(
            ProviderError::NetworkFailure("reset".into()).kind(),
            ProviderErrorKind::NetworkFailure
        );
        assert_eq!(
            ProviderError::MalformedResponse("x".into()).kind(),
            ProviderErrorKind::MalformedResponse
        );
        assert_eq!(ProviderError::RateLimited.kind(), ProviderErrorKind::RateLimited);
    }

    #[test]
    fn user_messages_are_distinct_per_kind() {
        let rate = ProviderError::RateLimited.user_message();
        let auth = ProviderError::Unauthorized.user_message();
        let net = ProviderError::NetworkFailure("timeout".into()).user_message();
        let bad = ProviderError::MalformedResponse("missing main".into()).user_message();

        assert!(rate.contains("Too many"));
        assert!(auth.contains("API key"));
        assert!(net.contains("connection"));
        assert!(bad.contains("unexpected data"));
    }

    #[test]
    fn user_message_hides_detail() {
        let msg = ProviderError::NetworkFailure("tcp connect error 10.0.0.1".into()).user_message();
        assert!(!msg.contains("10.0.0.1"));
    }
}
