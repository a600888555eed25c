//! Conformance checks for [`StorageBackend`] implementations.
//!
//! Each function exercises one aspect of the trait contract against a fresh,
//! empty backend. [`MemoryBackend`](crate::MemoryBackend) and
//! [`FileBackend`](crate::FileBackend) both run the full suite from
//! `tests/conformance.rs`.
//!
//! # Usage
//!
//! ```no_run
//! use keygate_storage::{MemoryBackend, conformance};
//!
//! #[tokio::test]
//! async fn get_returns_none_for_missing_key() {
//!     conformance::crud_get_returns_none_for_missing_key(&MemoryBackend::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Contract aspect |
//! |----------|-----------------|
//! | CRUD | Basic get/set/delete semantics |
//! | CAS | `compare_and_set` and `compare_and_delete` preconditions |
//! | Scan | `scan_prefix` ordering and filtering |
//! | Concurrent | Single winner under parallel conditional writes |

use std::sync::Arc;

use bytes::Bytes;

use crate::{assert_conflict, backend::StorageBackend};

// ============================================================================
// CRUD
// ============================================================================

/// `get` on a nonexistent key returns `Ok(None)`.
pub async fn crud_get_returns_none_for_missing_key<B: StorageBackend>(backend: &B) {
    let result = backend.get(b"nonexistent").await.expect("get");
    assert_eq!(result, None, "missing key should return None");
}

/// `set` followed by `get` returns the stored bytes.
pub async fn crud_set_then_get_returns_value<B: StorageBackend>(backend: &B) {
    backend.set(b"k".to_vec(), b"v".to_vec()).await.expect("set");
    assert_eq!(backend.get(b"k").await.expect("get"), Some(Bytes::from("v")));
}

/// A second `set` overwrites the first.
pub async fn crud_set_overwrites_existing<B: StorageBackend>(backend: &B) {
    backend.set(b"k".to_vec(), b"first".to_vec()).await.expect("set");
    backend.set(b"k".to_vec(), b"second".to_vec()).await.expect("set");
    assert_eq!(backend.get(b"k").await.expect("get"), Some(Bytes::from("second")));
}

/// Deleting a key that does not exist succeeds.
pub async fn crud_delete_nonexistent_is_noop<B: StorageBackend>(backend: &B) {
    backend.delete(b"nonexistent").await.expect("delete of missing key should succeed");
}

/// `delete` removes a stored key.
pub async fn crud_delete_removes_key<B: StorageBackend>(backend: &B) {
    backend.set(b"k".to_vec(), b"v".to_vec()).await.expect("set");
    backend.delete(b"k").await.expect("delete");
    assert_eq!(backend.get(b"k").await.expect("get"), None);
}

/// Keys that differ only in case or trailing bytes are distinct.
pub async fn crud_keys_are_byte_distinct<B: StorageBackend>(backend: &B) {
    backend.set(b"key".to_vec(), b"lower".to_vec()).await.expect("set");
    backend.set(b"KEY".to_vec(), b"upper".to_vec()).await.expect("set");
    backend.set(b"key/".to_vec(), b"slash".to_vec()).await.expect("set");

    assert_eq!(backend.get(b"key").await.expect("get"), Some(Bytes::from("lower")));
    assert_eq!(backend.get(b"KEY").await.expect("get"), Some(Bytes::from("upper")));
    assert_eq!(backend.get(b"key/").await.expect("get"), Some(Bytes::from("slash")));
}

/// Empty values are stored and returned as empty, not as missing.
pub async fn crud_empty_value_roundtrip<B: StorageBackend>(backend: &B) {
    backend.set(b"empty".to_vec(), Vec::new()).await.expect("set");
    assert_eq!(backend.get(b"empty").await.expect("get"), Some(Bytes::new()));
}

// ============================================================================
// CAS
// ============================================================================

/// Insert-if-absent succeeds once and then conflicts.
pub async fn cas_insert_if_absent<B: StorageBackend>(backend: &B) {
    backend.compare_and_set(b"k", None, b"first".to_vec()).await.expect("first insert");
    assert_conflict!(backend.compare_and_set(b"k", None, b"second".to_vec()).await);
    assert_eq!(backend.get(b"k").await.expect("get"), Some(Bytes::from("first")));
}

/// Update-if-unchanged fails on stale and missing values.
pub async fn cas_update_requires_exact_match<B: StorageBackend>(backend: &B) {
    assert_conflict!(backend.compare_and_set(b"k", Some(b"v"), b"x".to_vec()).await);

    backend.set(b"k".to_vec(), b"v1".to_vec()).await.expect("set");
    assert_conflict!(backend.compare_and_set(b"k", Some(b"v"), b"x".to_vec()).await);
    backend.compare_and_set(b"k", Some(b"v1"), b"v2".to_vec()).await.expect("cas");
    assert_eq!(backend.get(b"k").await.expect("get"), Some(Bytes::from("v2")));
}

/// `compare_and_delete` removes only a byte-identical value.
pub async fn cas_compare_and_delete<B: StorageBackend>(backend: &B) {
    assert!(!backend.compare_and_delete(b"k", b"v").await.expect("cad on missing"));

    backend.set(b"k".to_vec(), b"v".to_vec()).await.expect("set");
    assert!(!backend.compare_and_delete(b"k", b"v-longer").await.expect("cad mismatch"));
    assert!(backend.compare_and_delete(b"k", b"v").await.expect("cad match"));
    assert_eq!(backend.get(b"k").await.expect("get"), None);
}

// ============================================================================
// Scan
// ============================================================================

/// `scan_prefix` returns only keys under the prefix, in key order.
pub async fn scan_prefix_filters_and_orders<B: StorageBackend>(backend: &B) {
    for key in ["p/c", "p/a", "q/a", "p/b", "p"] {
        backend.set(key.as_bytes().to_vec(), b"v".to_vec()).await.expect("set");
    }

    let keys: Vec<Bytes> =
        backend.scan_prefix(b"p/").await.expect("scan").into_iter().map(|kv| kv.key).collect();
    assert_eq!(keys, vec![Bytes::from("p/a"), Bytes::from("p/b"), Bytes::from("p/c")]);
}

/// `scan_prefix` on an unused prefix is empty.
pub async fn scan_prefix_empty<B: StorageBackend>(backend: &B) {
    backend.set(b"a".to_vec(), b"v".to_vec()).await.expect("set");
    assert!(backend.scan_prefix(b"zzz").await.expect("scan").is_empty());
}

// ============================================================================
// Concurrent
// ============================================================================

/// Of many concurrent insert-if-absent calls, exactly one succeeds.
pub async fn concurrent_insert_if_absent_single_winner<B: StorageBackend + 'static>(
    backend: Arc<B>,
) {
    let mut handles = Vec::new();
    for i in 0..10u8 {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            backend.compare_and_set(b"race", None, vec![i]).await.is_ok()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task") {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one insert-if-absent should win");
}

/// Of many concurrent compare-and-delete calls, exactly one removes the key.
pub async fn concurrent_compare_and_delete_single_winner<B: StorageBackend + 'static>(
    backend: Arc<B>,
) {
    backend.set(b"race".to_vec(), b"v".to_vec()).await.expect("set");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            backend.compare_and_delete(b"race", b"v").await.expect("cad")
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task") {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one compare-and-delete should win");
}
