//! Error types for the mirror proxy

use thiserror::Error;

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Error types that can occur while mirroring a request
#[derive(Error, Debug, Clone)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Upstream request failed: {0}")]
    UpstreamError(String),

    #[error("Upstream request timed out: {0}")]
    Timeout(String),

    #[error("Cache store error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MirrorError {
    /// Determine if this error should trigger a retry of the upstream fetch
    ///
    /// Returns true for errors that are potentially transient:
    /// - Network-level failures
    /// - Timeouts
    ///
    /// Returns false for errors that are definitive and won't benefit from
    /// retry: user-input errors (invalid path, unsupported host, bad method),
    /// configuration errors, and cache-store errors (cache failures must
    /// never block the request path at all).
    pub fn should_retry(&self) -> bool {
        match self {
            MirrorError::UpstreamError(_) => true,
            MirrorError::Timeout(_) => true,

            MirrorError::ConfigError(_) => false,
            MirrorError::InvalidPath(_) => false,
            MirrorError::UnsupportedHost(_) => false,
            MirrorError::MethodNotAllowed(_) => false,
            MirrorError::CacheError(_) => false,
            MirrorError::InternalError(_) => false,
        }
    }

    /// Convert error to HTTP status code
    ///
    /// Maps internal errors to the status the inbound surface should return:
    /// - User input errors (path/host) are 400
    /// - Disallowed methods are 405
    /// - Exhausted upstream failures are 502, timeouts 504
    /// - Everything else is 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            MirrorError::InvalidPath(_) => 400,
            MirrorError::UnsupportedHost(_) => 400,
            MirrorError::MethodNotAllowed(_) => 405,
            MirrorError::UpstreamError(_) => 502,
            MirrorError::Timeout(_) => 504,
            MirrorError::ConfigError(_) => 500,
            MirrorError::CacheError(_) => 500,
            MirrorError::InternalError(_) => 500,
        }
    }

    /// Whether this error is a user-input error on the inbound path
    ///
    /// These get the plaintext usage message rather than a bare status line.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MirrorError::InvalidPath(_) | MirrorError::UnsupportedHost(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(MirrorError::UpstreamError("connection reset".into()).should_retry());
        assert!(MirrorError::Timeout("30s elapsed".into()).should_retry());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!MirrorError::InvalidPath("empty".into()).should_retry());
        assert!(!MirrorError::UnsupportedHost("evil.example".into()).should_retry());
        assert!(!MirrorError::MethodNotAllowed("POST".into()).should_retry());
        assert!(!MirrorError::CacheError("lock poisoned".into()).should_retry());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(MirrorError::InvalidPath("x".into()).to_http_status(), 400);
        assert_eq!(MirrorError::UnsupportedHost("x".into()).to_http_status(), 400);
        assert_eq!(MirrorError::MethodNotAllowed("PUT".into()).to_http_status(), 405);
        assert_eq!(MirrorError::UpstreamError("x".into()).to_http_status(), 502);
        assert_eq!(MirrorError::Timeout("x".into()).to_http_status(), 504);
        assert_eq!(MirrorError::InternalError("x".into()).to_http_status(), 500);
    }

    #[test]
    fn test_user_error_classification() {
        assert!(MirrorError::InvalidPath("x".into()).is_user_error());
        assert!(MirrorError::UnsupportedHost("x".into()).is_user_error());
        assert!(!MirrorError::Timeout("x".into()).is_user_error());
    }
}
