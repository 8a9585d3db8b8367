//! CDN error types.

use thiserror::Error;

pub type CdnResult<T> = Result<T, CdnError>;

#[derive(Debug, Error)]
pub enum CdnError {
    /// The CDN refuses flushes until the hourly quota resets.
    #[error("Flush rate limited: {0}")]
    RateLimited(String),

    #[error("Unable to flush: {0}")]
    FlushFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl CdnError {
    pub fn flush_failed(msg: impl Into<String>) -> Self {
        Self::FlushFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Rate limiting lasts until the quota window resets; callers must not
    /// retry immediately.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CdnError::RateLimited(_))
    }

    /// Transient failures worth an immediate retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CdnError::Timeout(_) | CdnError::Network(_))
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CdnError::RateLimited(_) => "rate_limited",
            CdnError::FlushFailed(_) => "failed",
            CdnError::InvalidResponse(_) => "invalid_response",
            CdnError::Timeout(_) => "timeout",
            CdnError::Config(_) => "config",
            CdnError::Network(_) => "network",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_not_retryable() {
        let err = CdnError::RateLimited("Over the limit of flush requests per hour".into());
        assert!(err.is_rate_limited());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "rate_limited");
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(CdnError::Timeout(10).is_retryable());
        assert!(!CdnError::flush_failed("bad site").is_retryable());
    }
}
