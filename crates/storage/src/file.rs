//! Durable file-system storage backend.
//!
//! [`FileBackend`] keeps one file per key below a root directory. File names
//! are the base64url encoding of the key followed by [`RECORD_SUFFIX`], which
//! keeps arbitrary keys (including ones containing `/` or `..`) inside the
//! root.
//!
//! # Durability
//!
//! Every write lands in a uniquely named temporary file in the root, is
//! flushed with `fsync`, and is then renamed over the target. Readers observe
//! either the previous or the new contents, never a torn record.
//!
//! # Concurrency
//!
//! Mutating operations are serialised through an in-process async mutex, which
//! makes [`compare_and_set`](StorageBackend::compare_and_set) and
//! [`compare_and_delete`](StorageBackend::compare_and_delete) atomic for a
//! single gateway process. Running several processes against one root is not
//! supported.
//!
//! # Example
//!
//! ```no_run
//! use keygate_storage::{FileBackend, StorageBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = FileBackend::open("/var/lib/keygate").await?;
//! backend.set(b"greeting".to_vec(), b"hello".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    types::KeyValue,
};

/// File name suffix of every stored record.
pub const RECORD_SUFFIX: &str = ".rec";

/// Largest key accepted, in bytes.
///
/// The encoded file name must stay below the 255-byte limit common to
/// Linux and macOS file systems.
pub const MAX_KEY_SIZE: usize = 180;

const TEMP_PREFIX: &str = ".tmp-";

/// File-system backed implementation of [`StorageBackend`].
///
/// Cloning is cheap; clones share the root and the write lock.
#[derive(Clone, Debug)]
pub struct FileBackend {
    root: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl FileBackend {
    /// Opens (and creates, when missing) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the directory cannot be created.
    #[tracing::instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::internal_with_source(
                format!("failed to create store root {}", root.display()),
                e,
            )
        })?;

        tracing::debug!("file store opened");
        Ok(Self { root: Arc::new(root), write_lock: Arc::new(Mutex::new(())) })
    }

    /// Returns the directory this backend stores records in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &[u8]) -> StorageResult<PathBuf> {
        if key.len() > MAX_KEY_SIZE {
            return Err(StorageError::internal(format!(
                "key of {} bytes exceeds the {MAX_KEY_SIZE}-byte limit",
                key.len()
            )));
        }
        Ok(self.root.join(format!("{}{RECORD_SUFFIX}", URL_SAFE_NO_PAD.encode(key))))
    }

    async fn read_record(path: &Path) -> StorageResult<Option<Bytes>> {
        match fs::read(path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::internal_with_source(
                format!("failed to read {}", path.display()),
                e,
            )),
        }
    }

    async fn write_record(&self, path: &Path, value: &[u8]) -> StorageResult<()> {
        let temp = self.root.join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4()));

        let result = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(value).await?;
            file.sync_all().await?;
            fs::rename(&temp, path).await
        }
        .await;

        if let Err(e) = result {
            // The temporary file may not exist if creation itself failed.
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::internal_with_source(
                format!("failed to write {}", path.display()),
                e,
            ));
        }
        Ok(())
    }

    async fn remove_record(path: &Path) -> StorageResult<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::internal_with_source(
                format!("failed to remove {}", path.display()),
                e,
            )),
        }
    }

    /// Decodes a directory entry name back into its key.
    ///
    /// Returns `None` for temporary files and anything not written by this
    /// backend.
    fn key_from_file_name(name: &str) -> Option<Vec<u8>> {
        let encoded = name.strip_suffix(RECORD_SUFFIX)?;
        URL_SAFE_NO_PAD.decode(encoded).ok()
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let path = self.path_for(key)?;
        Self::read_record(&path).await
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let path = self.path_for(&key)?;
        let _guard = self.write_lock.lock().await;
        self.write_record(&path, &value).await
    }

    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;

        let current = Self::read_record(&path).await?;
        let matches = match (expected, &current) {
            (None, None) => true,
            (Some(exp), Some(cur)) => exp == &cur[..],
            _ => false,
        };

        if !matches {
            return Err(StorageError::Conflict);
        }

        self.write_record(&path, &new_value).await
    }

    async fn compare_and_delete(&self, key: &[u8], expected: &[u8]) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;

        match Self::read_record(&path).await? {
            Some(current) if current.as_ref() == expected => Self::remove_record(&path).await,
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;
        Self::remove_record(&path).await.map(|_| ())
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>> {
        let mut entries = fs::read_dir(self.root.as_path()).await.map_err(|e| {
            StorageError::internal_with_source(
                format!("failed to list {}", self.root.display()),
                e,
            )
        })?;

        let mut results = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                StorageError::internal_with_source(
                    format!("failed to list {}", self.root.display()),
                    e,
                )
            })?;
            let Some(entry) = entry else { break };

            let file_name = entry.file_name();
            let Some(key) = file_name.to_str().and_then(Self::key_from_file_name) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }

            // A concurrent delete between listing and reading is not an error.
            if let Some(value) = Self::read_record(&entry.path()).await? {
                results.push(KeyValue::new(Bytes::from(key), value));
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(self.root.as_path()).await.map_err(|e| {
            StorageError::internal_with_source(
                format!("store root {} is not accessible", self.root.display()),
                e,
            )
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::internal(format!(
                "store root {} is not a directory",
                self.root.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(StorageError::internal(format!(
                "store root {} is read-only",
                self.root.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn open_temp() -> (TempDir, FileBackend) {
        let dir = TempDir::new().expect("tempdir");
        let backend = FileBackend::open(dir.path()).await.expect("open");
        (dir, backend)
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let (_dir, backend) = open_temp().await;

        backend.set(b"key1".to_vec(), b"value1".to_vec()).await.unwrap();
        assert_eq!(backend.get(b"key1").await.unwrap(), Some(Bytes::from("value1")));

        backend.set(b"key1".to_vec(), b"value2".to_vec()).await.unwrap();
        assert_eq!(backend.get(b"key1").await.unwrap(), Some(Bytes::from("value2")));

        backend.delete(b"key1").await.unwrap();
        assert_eq!(backend.get(b"key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let (_dir, backend) = open_temp().await;
        backend.delete(b"missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_open_creates_nested_root() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = FileBackend::open(&nested).await.unwrap();

        assert!(nested.is_dir());
        assert_eq!(backend.root(), nested.as_path());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let (dir, backend) = open_temp().await;
        backend.set(b"signing-keys/active".to_vec(), b"material".to_vec()).await.unwrap();
        drop(backend);

        let reopened = FileBackend::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get(b"signing-keys/active").await.unwrap(),
            Some(Bytes::from("material"))
        );
    }

    #[tokio::test]
    async fn test_path_traversal_keys_stay_inside_root() {
        let (dir, backend) = open_temp().await;
        backend.set(b"../../etc/passwd".to_vec(), b"x".to_vec()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(backend.get(b"../../etc/passwd").await.unwrap(), Some(Bytes::from("x")));
    }

    #[tokio::test]
    async fn test_oversized_key_rejected() {
        let (_dir, backend) = open_temp().await;
        let key = vec![b'k'; MAX_KEY_SIZE + 1];
        let result = backend.set(key, b"v".to_vec()).await;
        assert!(matches!(result, Err(StorageError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_compare_and_set_insert_if_absent() {
        let (_dir, backend) = open_temp().await;

        backend.compare_and_set(b"key", None, b"first".to_vec()).await.unwrap();
        let second = backend.compare_and_set(b"key", None, b"second".to_vec()).await;

        assert!(matches!(second, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("first")));
    }

    #[tokio::test]
    async fn test_compare_and_set_update_if_unchanged() {
        let (_dir, backend) = open_temp().await;
        backend.set(b"key".to_vec(), b"v1".to_vec()).await.unwrap();

        backend.compare_and_set(b"key", Some(b"v1"), b"v2".to_vec()).await.unwrap();
        let stale = backend.compare_and_set(b"key", Some(b"v1"), b"v3".to_vec()).await;

        assert!(matches!(stale, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("v2")));
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let (_dir, backend) = open_temp().await;
        backend.set(b"key".to_vec(), b"v1".to_vec()).await.unwrap();

        assert!(!backend.compare_and_delete(b"key", b"v2").await.unwrap());
        assert!(backend.compare_and_delete(b"key", b"v1").await.unwrap());
        assert!(!backend.compare_and_delete(b"key", b"v1").await.unwrap());
        assert_eq!(backend.get(b"key").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_insert_if_absent_has_single_winner() {
        let (_dir, backend) = open_temp().await;

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend.compare_and_set(b"once", None, vec![i]).await.is_ok()
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

    #[tokio::test]
    async fn test_scan_prefix_sorted_and_filtered() {
        let (dir, backend) = open_temp().await;
        backend.set(b"challenges/bb".to_vec(), b"2".to_vec()).await.unwrap();
        backend.set(b"challenges/aa".to_vec(), b"1".to_vec()).await.unwrap();
        backend.set(b"signing-keys/active".to_vec(), b"k".to_vec()).await.unwrap();

        // Stray files in the root are ignored.
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join(".tmp-leftover"), b"partial").unwrap();

        let scanned = backend.scan_prefix(b"challenges/").await.unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].key, Bytes::from("challenges/aa"));
        assert_eq!(scanned[1].key, Bytes::from("challenges/bb"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (dir, backend) = open_temp().await;
        assert!(backend.health_check().await.is_ok());

        drop(dir);
        assert!(backend.health_check().await.is_err());
    }
}
