//! TTL-bound challenge records.
//!
//! [`ChallengeStore`] persists pending challenges through any
//! [`StorageBackend`] and enforces their expiry when they are looked up.
//!
//! # Key Layout
//!
//! Each challenge lives under `challenges/{value}` as a JSON-encoded
//! [`ChallengeRecord`].
//!
//! # Lifecycle
//!
//! ```text
//! put ──► pending ──► is_valid (before expiry) ──► true, record kept
//!            │
//!            ├──────► is_valid (after expiry) ──► record removed, false
//!            ├──────► delete ──► removed
//!            ├──────► consume ──► removed, true for exactly one caller
//!            └──────► sweep_expired ──► removed once expired
//! ```
//!
//! Expired records are removed with
//! [`compare_and_delete`](StorageBackend::compare_and_delete) against the
//! exact bytes that were read, so a lookup never removes a record that was
//! rewritten in the meantime.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
};

/// Key prefix under which challenge records are stored.
pub const CHALLENGE_PREFIX: &str = "challenges/";

/// A pending challenge and the instant it stops being redeemable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChallengeRecord {
    /// The challenge value handed to the client.
    pub challenge: String,

    /// Absolute expiry; the challenge is invalid once `now > expires_at`.
    pub expires_at: DateTime<Utc>,
}

impl ChallengeRecord {
    /// Returns `true` if the record has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Persists challenges with expiry timestamps.
///
/// # Example
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use keygate_storage::{ChallengeStore, MemoryBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = ChallengeStore::new(Arc::new(MemoryBackend::new()));
///
/// store.put("9f1c", Duration::from_secs(30)).await.unwrap();
/// assert!(store.is_valid("9f1c").await.unwrap());
///
/// store.delete("9f1c").await.unwrap();
/// assert!(!store.is_valid("9f1c").await.unwrap());
/// # });
/// ```
#[derive(Clone)]
pub struct ChallengeStore {
    backend: Arc<dyn StorageBackend>,
}

impl ChallengeStore {
    /// Creates a challenge store on top of `backend`.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn storage_key(challenge: &str) -> Vec<u8> {
        format!("{CHALLENGE_PREFIX}{challenge}").into_bytes()
    }

    fn decode(raw: &[u8]) -> StorageResult<ChallengeRecord> {
        serde_json::from_slice(raw)
            .map_err(|e| StorageError::serialization_with_source("malformed challenge record", e))
    }

    /// Persists `challenge` with `expires_at = now + ttl`.
    ///
    /// Any existing record with the same value is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the TTL overflows the
    /// timestamp range, or the backend's error if the write fails.
    #[tracing::instrument(skip(self, challenge), fields(ttl_secs = ttl.as_secs()))]
    pub async fn put(&self, challenge: &str, ttl: Duration) -> StorageResult<ChallengeRecord> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::serialization_with_source("challenge ttl out of range", e))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StorageError::serialization("challenge expiry out of range"))?;

        let record = ChallengeRecord { challenge: challenge.to_owned(), expires_at };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| StorageError::serialization_with_source("encode challenge record", e))?;

        self.backend.set(Self::storage_key(challenge), bytes).await?;
        Ok(record)
    }

    /// Returns `true` if `challenge` exists and has not expired.
    ///
    /// An expired record is removed before `false` is returned. The removal
    /// only succeeds against the exact record that was read.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] for a corrupt record, or the
    /// backend's error on I/O failure.
    #[tracing::instrument(skip_all)]
    pub async fn is_valid(&self, challenge: &str) -> StorageResult<bool> {
        let key = Self::storage_key(challenge);
        let Some(raw) = self.backend.get(&key).await? else {
            return Ok(false);
        };

        let record = Self::decode(&raw)?;
        if record.challenge != challenge {
            tracing::warn!("challenge record does not match its key");
            return Ok(false);
        }

        if record.is_expired_at(Utc::now()) {
            let removed = self.backend.compare_and_delete(&key, &raw).await?;
            tracing::debug!(removed, "expired challenge rejected");
            return Ok(false);
        }

        Ok(true)
    }

    /// Removes `challenge`; a no-op when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the backend's error on I/O failure.
    #[tracing::instrument(skip_all)]
    pub async fn delete(&self, challenge: &str) -> StorageResult<()> {
        self.backend.delete(&Self::storage_key(challenge)).await
    }

    /// Atomically removes an unexpired `challenge`.
    ///
    /// Returns `true` only for the caller whose removal succeeded; every
    /// other concurrent caller, and any caller after expiry, gets `false`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] for a corrupt record, or the
    /// backend's error on I/O failure.
    #[tracing::instrument(skip_all)]
    pub async fn consume(&self, challenge: &str) -> StorageResult<bool> {
        let key = Self::storage_key(challenge);
        let Some(raw) = self.backend.get(&key).await? else {
            return Ok(false);
        };

        let record = Self::decode(&raw)?;
        let removed = self.backend.compare_and_delete(&key, &raw).await?;

        Ok(removed && record.challenge == challenge && !record.is_expired_at(Utc::now()))
    }

    /// Removes every expired challenge and returns how many were removed.
    ///
    /// Corrupt records are skipped with a warning so one bad file does not
    /// stall the sweep.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if listing or deleting fails.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired(&self) -> StorageResult<usize> {
        let now = Utc::now();
        let mut removed = 0;

        for entry in self.backend.scan_prefix(CHALLENGE_PREFIX.as_bytes()).await? {
            let record = match Self::decode(&entry.value) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping corrupt challenge record");
                    continue;
                },
            };

            if record.is_expired_at(now)
                && self.backend.compare_and_delete(&entry.key, &entry.value).await?
            {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "swept expired challenges");
        }
        Ok(removed)
    }

    /// Spawns a task that calls [`sweep_expired`](Self::sweep_expired) every
    /// `interval` until `cancel` fires.
    ///
    /// Sweep failures are logged and retried on the next tick.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {},
                    () = cancel.cancelled() => {
                        tracing::debug!("challenge sweeper stopped");
                        return;
                    },
                }

                if let Err(e) = self.sweep_expired().await {
                    tracing::error!(error = %e, "challenge sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn store() -> (MemoryBackend, ChallengeStore) {
        let backend = MemoryBackend::new();
        let store = ChallengeStore::new(Arc::new(backend.clone()));
        (backend, store)
    }

    #[tokio::test]
    async fn test_put_then_valid() {
        let (_backend, store) = store();
        let record = store.put("abc123", Duration::from_secs(60)).await.unwrap();

        assert_eq!(record.challenge, "abc123");
        assert!(record.expires_at > Utc::now());
        assert!(store.is_valid("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_challenge_is_invalid() {
        let (_backend, store) = store();
        assert!(!store.is_valid("never-issued").await.unwrap());
    }

    #[tokio::test]
    async fn test_valid_lookup_keeps_record() {
        let (backend, store) = store();
        store.put("abc123", Duration::from_secs(60)).await.unwrap();

        assert!(store.is_valid("abc123").await.unwrap());
        assert!(store.is_valid("abc123").await.unwrap());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_lookup_removes_record() {
        let (backend, store) = store();
        store.put("abc123", Duration::from_millis(50)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!store.is_valid("abc123").await.unwrap());
        assert!(backend.is_empty(), "expired record should be removed on lookup");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_backend, store) = store();
        store.put("abc123", Duration::from_secs(60)).await.unwrap();

        store.delete("abc123").await.unwrap();
        store.delete("abc123").await.unwrap();
        assert!(!store.is_valid("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_record() {
        let (_backend, store) = store();
        store.put("abc123", Duration::from_millis(10)).await.unwrap();
        store.put("abc123", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_valid("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_mismatched_record_is_invalid() {
        let (backend, store) = store();
        let forged = ChallengeRecord {
            challenge: "other".to_owned(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        };
        backend
            .set(b"challenges/abc123".to_vec(), serde_json::to_vec(&forged).unwrap())
            .await
            .unwrap();

        assert!(!store.is_valid("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_serialization_error() {
        let (backend, store) = store();
        backend.set(b"challenges/abc123".to_vec(), b"not json".to_vec()).await.unwrap();

        let result = store.is_valid("abc123").await;
        assert!(matches!(result, Err(StorageError::Serialization { .. })));
    }

    #[tokio::test]
    async fn test_consume_succeeds_once() {
        let (_backend, store) = store();
        store.put("abc123", Duration::from_secs(60)).await.unwrap();

        assert!(store.consume("abc123").await.unwrap());
        assert!(!store.consume("abc123").await.unwrap());
        assert!(!store.is_valid("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_expired_fails_and_removes() {
        let (backend, store) = store();
        store.put("abc123", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!store.consume("abc123").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_has_single_winner() {
        let (_backend, store) = store();
        store.put("abc123", Duration::from_secs(60)).await.unwrap();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.consume("abc123").await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let (backend, store) = store();
        store.put("short", Duration::from_millis(20)).await.unwrap();
        store.put("long", Duration::from_secs(60)).await.unwrap();
        backend.set(b"signing-keys/active".to_vec(), b"untouched".to_vec()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert!(store.is_valid("long").await.unwrap());
        assert!(backend.get(b"signing-keys/active").await.unwrap().is_some());
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_skips_corrupt_records() {
        let (backend, store) = store();
        backend.set(b"challenges/bad".to_vec(), b"{".to_vec()).await.unwrap();
        store.put("short", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert!(backend.get(b"challenges/bad").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweeper_task_runs_until_cancelled() {
        let (backend, store) = store();
        let store = Arc::new(store);
        store.put("short", Duration::from_millis(10)).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = Arc::clone(&store).spawn_sweeper(Duration::from_millis(25), cancel.clone());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(backend.is_empty(), "sweeper should have removed the expired record");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop after cancellation")
            .unwrap();
    }
}
