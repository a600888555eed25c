//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`StorageBackend`] used by unit tests and by gateways that do not need
//! challenges or keys to survive a restart.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Ordered storage**: Keys are stored in a [`BTreeMap`] so prefix scans come back sorted
//! - **Atomic conditionals**: compare-and-set and compare-and-delete run under the write lock
//!
//! # Example
//!
//! ```
//! use keygate_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits

use std::{collections::BTreeMap, ops::Bound, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    types::KeyValue,
};

/// In-memory storage backend using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
}

impl MemoryBackend {
    /// Creates a new, empty in-memory storage backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let data = self.data.read();
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        data.insert(key, Bytes::from(value));
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        let mut data = self.data.write();

        let matches = match (expected, data.get(key)) {
            (None, None) => true,
            (Some(exp), Some(cur)) => exp == &cur[..],
            _ => false,
        };

        if !matches {
            return Err(StorageError::Conflict);
        }

        data.insert(key.to_vec(), Bytes::from(new_value));
        Ok(())
    }

    async fn compare_and_delete(&self, key: &[u8], expected: &[u8]) -> StorageResult<bool> {
        let mut data = self.data.write();

        match data.get(key) {
            Some(current) if current.as_ref() == expected => {
                data.remove(key);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        data.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>> {
        let data = self.data.read();

        let results = data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(k, v)| KeyValue::new(Bytes::copy_from_slice(k), v.clone()))
            .collect();

        Ok(results)
    }

    async fn health_check(&self) -> StorageResult<()> {
        // Acquiring the read lock proves the store is not wedged.
        let _unused = self.data.read();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let backend = MemoryBackend::new();

        backend.set(b"key1".to_vec(), b"value1".to_vec()).await.unwrap();
        let value = backend.get(b"key1").await.unwrap();
        assert_eq!(value, Some(Bytes::from("value1")));

        backend.delete(b"key1").await.unwrap();
        let value = backend.get(b"key1").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete(b"never-written").await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let backend = MemoryBackend::new();

        backend.set(b"challenges/a".to_vec(), b"1".to_vec()).await.unwrap();
        backend.set(b"challenges/b".to_vec(), b"2".to_vec()).await.unwrap();
        backend.set(b"signing-keys/active".to_vec(), b"3".to_vec()).await.unwrap();
        backend.set(b"challengesX".to_vec(), b"4".to_vec()).await.unwrap();

        let scanned = backend.scan_prefix(b"challenges/").await.unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].key, Bytes::from("challenges/a"));
        assert_eq!(scanned[1].key, Bytes::from("challenges/b"));
    }

    #[tokio::test]
    async fn test_scan_empty_prefix_returns_everything() {
        let backend = MemoryBackend::new();
        backend.set(b"a".to_vec(), b"1".to_vec()).await.unwrap();
        backend.set(b"b".to_vec(), b"2".to_vec()).await.unwrap();

        assert_eq!(backend.scan_prefix(b"").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = MemoryBackend::new();
        assert!(backend.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_clone_shares_data() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();

        backend.set(b"shared".to_vec(), b"yes".to_vec()).await.unwrap();
        assert_eq!(clone.get(b"shared").await.unwrap(), Some(Bytes::from("yes")));
        assert_eq!(clone.len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_set_success() {
        let backend = MemoryBackend::new();
        backend.set(b"key".to_vec(), b"v1".to_vec()).await.unwrap();

        backend.compare_and_set(b"key", Some(b"v1"), b"v2".to_vec()).await.unwrap();
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("v2")));
    }

    #[tokio::test]
    async fn test_compare_and_set_conflict() {
        let backend = MemoryBackend::new();
        backend.set(b"key".to_vec(), b"v1".to_vec()).await.unwrap();

        let result = backend.compare_and_set(b"key", Some(b"stale"), b"v2".to_vec()).await;
        assert!(matches!(result, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("v1")));
    }

    #[tokio::test]
    async fn test_compare_and_set_insert_if_absent() {
        let backend = MemoryBackend::new();

        backend.compare_and_set(b"key", None, b"first".to_vec()).await.unwrap();
        let second = backend.compare_and_set(b"key", None, b"second".to_vec()).await;

        assert!(matches!(second, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("first")));
    }

    #[tokio::test]
    async fn test_compare_and_set_nonexistent_key_with_expected_some() {
        let backend = MemoryBackend::new();
        let result = backend.compare_and_set(b"missing", Some(b"v"), b"new".to_vec()).await;
        assert!(matches!(result, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let backend = MemoryBackend::new();
        backend.set(b"key".to_vec(), b"v1".to_vec()).await.unwrap();

        assert!(!backend.compare_and_delete(b"key", b"other").await.unwrap());
        assert!(backend.get(b"key").await.unwrap().is_some());

        assert!(backend.compare_and_delete(b"key", b"v1").await.unwrap());
        assert!(backend.get(b"key").await.unwrap().is_none());

        assert!(!backend.compare_and_delete(b"key", b"v1").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_compare_and_delete_has_single_winner() {
        let backend = MemoryBackend::new();
        backend.set(b"key".to_vec(), b"v".to_vec()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend.compare_and_delete(b"key", b"v").await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Every key returned by a prefix scan carries the prefix, and
            /// every stored key carrying the prefix is returned in order.
            #[test]
            fn scan_prefix_matches_filter(
                keys in proptest::collection::btree_set(
                    proptest::collection::vec(0u8..4, 1..6), 0..40),
                prefix in proptest::collection::vec(0u8..4, 0..3),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("runtime");

                rt.block_on(async {
                    let backend = MemoryBackend::new();
                    for key in &keys {
                        backend.set(key.clone(), b"v".to_vec()).await.unwrap();
                    }

                    let results = backend.scan_prefix(&prefix).await.unwrap();
                    let expected: Vec<&Vec<u8>> =
                        keys.iter().filter(|k| k.starts_with(&prefix)).collect();

                    prop_assert_eq!(results.len(), expected.len());
                    for (kv, key) in results.iter().zip(expected) {
                        prop_assert_eq!(kv.key.as_ref(), key.as_slice());
                    }

                    Ok(())
                })?;
            }
        }
    }
}
