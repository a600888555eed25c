//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the durable key-value
//! abstraction that challenge records and the signing keypair are persisted
//! through. Implementations: [`MemoryBackend`](crate::MemoryBackend) for tests
//! and [`FileBackend`](crate::FileBackend) for deployments.
//!
//! # Design Philosophy
//!
//! - **Keys and values are bytes**: record encoding lives in the typed stores built on top
//! - **Async by default**: durable backends perform file I/O
//! - **Conditional primitives**: [`compare_and_set`](StorageBackend::compare_and_set) and
//!   [`compare_and_delete`](StorageBackend::compare_and_delete) give per-key atomicity without
//!   external locking
//!
//! The trait is object safe so stores can hold an `Arc<dyn StorageBackend>`
//! chosen at startup.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, types::KeyValue};

/// Abstract storage backend for key-value operations.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair |
/// | [`compare_and_set`](StorageBackend::compare_and_set) | Atomic compare-and-swap |
/// | [`compare_and_delete`](StorageBackend::compare_and_delete) | Atomic delete-if-unchanged |
/// | [`delete`](StorageBackend::delete) | Remove a key |
/// | [`scan_prefix`](StorageBackend::scan_prefix) | Retrieve every key under a prefix |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use keygate_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.set(b"key".to_vec(), b"value".to_vec()).await.unwrap();
/// let value = backend.get(b"key").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("value")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair, overwriting any existing value.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Atomically sets a key's value if it matches the expected current value.
    ///
    /// # Semantics
    ///
    /// - **`expected: None`**: insert-if-absent. Succeeds only when the key does not exist.
    /// - **`expected: Some(value)`**: update-if-unchanged. Succeeds only when the current value
    ///   is a byte-for-byte match of `value`.
    ///
    /// The comparison is exact and length-sensitive; there is no
    /// normalization of structured payloads.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) when the precondition fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keygate_storage::{MemoryBackend, StorageBackend};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let backend = MemoryBackend::new();
    ///
    /// // Insert-if-absent: succeeds because key is new
    /// backend.compare_and_set(b"lock", None, b"holder-1".to_vec()).await?;
    ///
    /// // Insert-if-absent again: fails with Conflict because key already exists
    /// let result = backend.compare_and_set(b"lock", None, b"holder-2".to_vec()).await;
    /// assert!(result.is_err());
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "compare-and-set may fail with a conflict and errors must be handled"]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Atomically deletes a key if its current value matches `expected`.
    ///
    /// Returns `Ok(true)` when this call removed the key and `Ok(false)` when
    /// the key was absent or held different bytes. Of several concurrent
    /// callers passing the same `expected` value, at most one observes `true`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn compare_and_delete(&self, key: &[u8], expected: &[u8]) -> StorageResult<bool>;

    /// Deletes a key.
    ///
    /// If the key doesn't exist, this is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Retrieves every key-value pair whose key starts with `prefix`.
    ///
    /// Results are returned in key order.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>>;

    /// Checks that the backend can currently serve requests.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}
