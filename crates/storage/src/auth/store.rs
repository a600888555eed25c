//! Storage trait and backend-generic implementation for the signing keypair.

use std::sync::Arc;

use async_trait::async_trait;

use super::SigningKeyPair;
use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
};

/// Storage key of the single active keypair.
pub const ACTIVE_KEYPAIR_KEY: &str = "signing-keys/active";

/// Persistence for the gateway's signing keypair.
///
/// Implementations must make [`create_keypair`](Self::create_keypair) an
/// insert-if-absent operation.
#[async_trait]
pub trait SigningKeyStore: Send + Sync {
    /// Returns the persisted keypair, or `None` if none has been generated.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored record is
    /// corrupt, or a backend error on I/O failure.
    async fn get_keypair(&self) -> StorageResult<Option<SigningKeyPair>>;

    /// Persists `keypair` unless one already exists.
    ///
    /// Returns `true` if `keypair` was stored and `false` if an existing
    /// keypair was left in place.
    ///
    /// # Errors
    ///
    /// Returns a backend error on I/O failure.
    async fn create_keypair(&self, keypair: &SigningKeyPair) -> StorageResult<bool>;
}

/// [`SigningKeyStore`] over any [`StorageBackend`].
#[derive(Clone)]
pub struct BackendSigningKeyStore {
    backend: Arc<dyn StorageBackend>,
}

impl BackendSigningKeyStore {
    /// Creates a keypair store on top of `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SigningKeyStore for BackendSigningKeyStore {
    #[tracing::instrument(skip(self))]
    async fn get_keypair(&self) -> StorageResult<Option<SigningKeyPair>> {
        let Some(raw) = self.backend.get(ACTIVE_KEYPAIR_KEY.as_bytes()).await? else {
            return Ok(None);
        };

        let keypair = serde_json::from_slice(&raw)
            .map_err(|e| StorageError::serialization_with_source("malformed signing keypair", e))?;
        Ok(Some(keypair))
    }

    #[tracing::instrument(skip(self, keypair), fields(kid = %keypair.kid))]
    async fn create_keypair(&self, keypair: &SigningKeyPair) -> StorageResult<bool> {
        let bytes = serde_json::to_vec(keypair)
            .map_err(|e| StorageError::serialization_with_source("encode signing keypair", e))?;

        match self.backend.compare_and_set(ACTIVE_KEYPAIR_KEY.as_bytes(), None, bytes).await {
            Ok(()) => Ok(true),
            Err(StorageError::Conflict) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
