use thiserror::Error;

/// Unified error type for the balancer
#[derive(Error, Debug)]
pub enum BalancerError {
    // Pool errors
    #[error("Empty proxy pool")]
    EmptyPool,

    #[error("Proxy discovery failed: {0}")]
    Discovery(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned disallowed status {status}")]
    BadStatus { status: u16 },

    #[error("Request timed out")]
    Timeout,

    // Content validation errors
    #[error("Expected text not found in response body")]
    ExpectedTextMissing,

    #[error("Forbidden text found in response body")]
    ForbiddenTextFound,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for balancer operations
pub type Result<T> = std::result::Result<T, BalancerError>;

impl BalancerError {
    /// Whether another attempt through a different proxy could succeed.
    ///
    /// `EmptyPool` is excluded: retrying cannot conjure proxies within the
    /// same call. Configuration and discovery errors never reach the retry
    /// loop in the first place.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BalancerError::Transport(_)
                | BalancerError::BadStatus { .. }
                | BalancerError::Timeout
                | BalancerError::ExpectedTextMissing
                | BalancerError::ForbiddenTextFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BalancerError::BadStatus { status: 502 }.is_retryable());
        assert!(BalancerError::Timeout.is_retryable());
        assert!(BalancerError::ExpectedTextMissing.is_retryable());
        assert!(BalancerError::ForbiddenTextFound.is_retryable());

        assert!(!BalancerError::EmptyPool.is_retryable());
        assert!(!BalancerError::Discovery("boom".to_string()).is_retryable());
        assert!(!BalancerError::InvalidConfig("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(BalancerError::EmptyPool.to_string(), "Empty proxy pool");
        assert_eq!(
            BalancerError::BadStatus { status: 403 }.to_string(),
            "Upstream returned disallowed status 403"
        );
    }
}
