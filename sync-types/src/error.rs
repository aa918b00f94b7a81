//! Error types for Soko-Sync.

use thiserror::Error;

/// Errors that can occur while decoding Soko-Sync data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Unrecognized action kind tag
    #[error("unknown action kind: {0}")]
    UnknownKind(String),

    /// Identifier could not be parsed
    #[error("invalid id: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::UnknownKind("ListingDelete".into());
        assert_eq!(err.to_string(), "unknown action kind: ListingDelete");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
