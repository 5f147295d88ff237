//! Error types for bucket configuration and state storage
use std::time::Duration;

/// Errors produced when validating bucket or store configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Bucket names are part of every cache key and must be non-empty.
    #[error("bucket name cannot be empty")]
    EmptyBucketName,
    /// Bucket names may not contain control characters.
    #[error("bucket name cannot contain control characters (got {0:?})")]
    InvalidBucketName(String),
    /// Bucket names may not contain `::` or end with `:`, so that every
    /// (bucket, client) pair maps to its own cache key.
    #[error("bucket name cannot contain \"::\" or end with ':' (got {0:?})")]
    AmbiguousBucketName(String),
    /// State TTL must be > 0.
    #[error("state ttl must be > 0")]
    ZeroTtl,
    /// Store call timeout must be > 0.
    #[error("store timeout must be > 0")]
    ZeroTimeout,
}

/// Failure while reading or writing bucket state.
///
/// None of these reach the caller of an admission check: reads fall back to a
/// fresh bucket and writes are dropped. They exist so the distinction shows up
/// in logs and in [`Fetch`](crate::state_store::Fetch).
#[derive(thiserror::Error, Debug)]
pub enum StoreError<E> {
    /// The backing store returned an error.
    #[error("store backend error: {0}")]
    Backend(#[source] E),
    /// The backing store did not answer within the configured timeout.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// Stored bytes could not be decoded (or state could not be encoded).
    #[error("bucket state codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl<E> StoreError<E> {
    /// Short label used as the `outcome` field in store logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Backend(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::Codec(_) => "malformed",
        }
    }

    /// Check if this error is due to a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this error is due to undecodable stored state
    pub fn is_codec(&self) -> bool {
        matches!(self, Self::Codec(_))
    }

    /// Borrow the backend error if present.
    pub fn as_backend(&self) -> Option<&E> {
        match self {
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn config_error_display() {
        assert_eq!(ConfigError::EmptyBucketName.to_string(), "bucket name cannot be empty");
        let msg = ConfigError::InvalidBucketName("a\nb".into()).to_string();
        assert!(msg.contains("control characters"));
        assert!(msg.contains("\\n"));

        let msg = ConfigError::AmbiguousBucketName("a::b".into()).to_string();
        assert!(msg.contains("\"a::b\""));
    }

    #[test]
    fn timeout_error_display() {
        let err: StoreError<io::Error> = StoreError::Timeout(Duration::from_millis(250));
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("250ms"));
        assert!(err.is_timeout());
        assert_eq!(err.outcome(), "timeout");
    }

    #[test]
    fn backend_error_exposes_source() {
        let err: StoreError<io::Error> =
            StoreError::Backend(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(err.outcome(), "unavailable");
        assert!(err.source().is_some());
        assert_eq!(err.as_backend().map(|e| e.kind()), Some(io::ErrorKind::ConnectionRefused));
    }

    #[test]
    fn codec_error_from_serde() {
        let bad = serde_json::from_slice::<serde_json::Value>(b"{not json").unwrap_err();
        let err: StoreError<io::Error> = bad.into();
        assert!(err.is_codec());
        assert_eq!(err.outcome(), "malformed");
        assert!(err.as_backend().is_none());
    }
}
