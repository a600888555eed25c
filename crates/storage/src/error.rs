//! Storage error types and result alias.
//!
//! Every backend maps its internal failures onto [`StorageError`] so callers
//! can handle conflicts, corrupt records and I/O failures uniformly.
//!
//! # Error Types
//!
//! - [`StorageError::Conflict`] - A conditional write observed an unexpected current value
//! - [`StorageError::Serialization`] - A stored record could not be encoded or decoded
//! - [`StorageError::Internal`] - Backend failure such as an unwritable store root
//!
//! # Example
//!
//! ```
//! use keygate_storage::{StorageError, StorageResult};
//!
//! fn load(raw: &[u8]) -> StorageResult<String> {
//!     String::from_utf8(raw.to_vec())
//!         .map_err(|e| StorageError::serialization_with_source("record is not UTF-8", e))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// logging layers to display the full error context.
///
/// # Non-exhaustive
///
/// New variants may be added without a semver-breaking change. Downstream
/// match expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A conditional operation found a value other than the expected one.
    ///
    /// Returned by [`compare_and_set`](crate::StorageBackend::compare_and_set)
    /// when the precondition does not hold.
    #[error("Conflicting write")]
    Conflict,

    /// Serialization or deserialization error.
    ///
    /// A stored record could not be decoded, which indicates corruption or a
    /// record written by an incompatible version.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal storage backend error.
    ///
    /// Covers I/O failures of durable backends (missing permissions, full
    /// disk, removed store root).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict() -> Self {
        Self::Conflict
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StorageError::conflict().to_string(), "Conflicting write");
        assert_eq!(
            StorageError::serialization("bad record").to_string(),
            "Serialization error: bad record"
        );
        assert_eq!(StorageError::internal("disk full").to_string(), "Internal error: disk full");
    }

    #[test]
    fn test_internal_preserves_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = StorageError::internal_with_source("write failed", io);

        let source = err.source().expect("source should be preserved");
        assert_eq!(source.to_string(), "read-only");
    }

    #[test]
    fn test_serialization_without_source_has_no_chain() {
        let err = StorageError::serialization("truncated");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_clone_shares_source() {
        let io = std::io::Error::other("boom");
        let err = StorageError::internal_with_source("write failed", io);
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(cloned.source().is_some());
    }
}
