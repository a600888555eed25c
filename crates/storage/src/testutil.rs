//! Shared test utilities for storage testing.
//!
//! This module provides helpers for seeding challenge records directly (for
//! example already-expired ones, so expiry tests need not sleep) and
//! assertion macros for [`StorageResult`] values. It is feature-gated behind
//! `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keygate-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keygate_storage::testutil::{seed_challenge, seed_expired_challenge};
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::{
    StorageBackend,
    challenge::{CHALLENGE_PREFIX, ChallengeRecord},
    error::{StorageError, StorageResult},
};

/// Writes a challenge record with an arbitrary expiry, bypassing
/// [`ChallengeStore::put`](crate::ChallengeStore::put).
///
/// # Panics
///
/// Panics if the record cannot be encoded or the write fails.
pub async fn seed_challenge(
    backend: &dyn StorageBackend,
    challenge: &str,
    expires_at: DateTime<Utc>,
) {
    let record = ChallengeRecord { challenge: challenge.to_owned(), expires_at };
    let bytes = serde_json::to_vec(&record).expect("encode challenge record");
    backend
        .set(format!("{CHALLENGE_PREFIX}{challenge}").into_bytes(), bytes)
        .await
        .expect("seed challenge");
}

/// Writes a challenge record that expired one minute ago.
///
/// # Panics
///
/// Panics if the write fails.
pub async fn seed_expired_challenge(backend: &dyn StorageBackend, challenge: &str) {
    seed_challenge(backend, challenge, Utc::now() - Duration::minutes(1)).await;
}

/// Returns `true` if a record for `challenge` is present in `backend`.
///
/// # Panics
///
/// Panics if the read fails.
pub async fn challenge_exists(backend: &dyn StorageBackend, challenge: &str) -> bool {
    backend
        .get(format!("{CHALLENGE_PREFIX}{challenge}").as_bytes())
        .await
        .expect("read challenge")
        .is_some()
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keygate_storage::assert_conflict;
/// use keygate_storage::error::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::Conflict);
/// assert_conflict!(result);
/// ```
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "{}: expected StorageError::Conflict, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::Serialization`].
#[macro_export]
macro_rules! assert_serialization_error {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Serialization { .. })),
            "expected StorageError::Serialization, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keygate_storage::assert_storage_ok;
/// use keygate_storage::error::StorageResult;
///
/// let result: StorageResult<i32> = Ok(42);
/// let value = assert_storage_ok!(result);
/// assert_eq!(value, 42);
/// ```
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Returns `true` if `result` is a [`StorageError::Conflict`].
pub fn is_conflict<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Conflict))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ChallengeStore, MemoryBackend};

    #[tokio::test]
    async fn test_seeded_expired_challenge_is_invalid() {
        let backend = MemoryBackend::new();
        seed_expired_challenge(&backend, "abc").await;
        assert!(challenge_exists(&backend, "abc").await);

        let store = ChallengeStore::new(std::sync::Arc::new(backend.clone()));
        assert!(!store.is_valid("abc").await.unwrap());
        assert!(!challenge_exists(&backend, "abc").await);
    }

    #[tokio::test]
    async fn test_seeded_future_challenge_is_valid() {
        let backend = MemoryBackend::new();
        seed_challenge(&backend, "abc", Utc::now() + Duration::minutes(5)).await;

        let store = ChallengeStore::new(std::sync::Arc::new(backend));
        assert!(store.is_valid("abc").await.unwrap());
    }

    #[test]
    fn test_assert_conflict_macro() {
        let result: StorageResult<()> = Err(StorageError::Conflict);
        assert_conflict!(result);
    }

    #[test]
    fn test_assert_serialization_error_macro() {
        let result: StorageResult<()> = Err(StorageError::serialization("bad"));
        assert_serialization_error!(result);
    }

    #[test]
    fn test_assert_storage_ok_macro() {
        let result: StorageResult<i32> = Ok(42);
        let val = assert_storage_ok!(result);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_is_conflict() {
        assert!(is_conflict::<()>(&Err(StorageError::Conflict)));
        assert!(!is_conflict::<()>(&Ok(())));
    }
}
