//! Key Store: the gateway's single Ed25519 signing keypair.
//!
//! The keypair is generated once, persisted through a
//! [`SigningKeyStore`], and never rotated while the process runs. Decoded
//! signing and verification material is cached so that token issuance and
//! validation do not hit the durable store on every request.
//!
//! # Persisted format
//!
//! Both components are base64url (no padding):
//!
//! - private: the 32-byte Ed25519 seed
//! - public: the 32-byte verifying key
//!
//! The seed is expanded to a PKCS#8 v1 document at load time, which is what
//! [`EncodingKey::from_ed_der`] expects.

use std::{fmt, sync::Arc};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SigningKey, VerifyingKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use keygate_storage::{
    StorageBackend,
    auth::{BackendSigningKeyStore, SigningKeyPair, SigningKeyStore},
};
use moka::future::Cache;
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::{
    error::{AuthError, Result},
    validation::validate_algorithm,
};

/// Key id written into every keypair this gateway generates.
pub const KEY_ID: &str = "deadbeef";

/// Signature algorithm of every keypair this gateway generates.
pub const KEY_ALGORITHM: Algorithm = Algorithm::EdDSA;

/// Persisted name of [`KEY_ALGORITHM`].
const KEY_ALGORITHM_NAME: &str = "EdDSA";

/// Cache slot for the active keypair's decoded material.
const ACTIVE_SLOT: &str = "active";

/// PKCS#8 v1 prefix for an Ed25519 private key; the 32-byte seed follows.
const PKCS8_ED25519_PREFIX: [u8; 16] = [
    0x30, 0x2e, // SEQUENCE, 46 bytes
    0x02, 0x01, 0x00, // INTEGER version 0
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
    0x04, 0x22, // OCTET STRING, 34 bytes
    0x04, 0x20, // OCTET STRING, 32 bytes (the seed)
];

/// Private signing material decoded from the persisted keypair.
pub struct SigningMaterial {
    /// Key id placed in the token header.
    pub kid: String,
    /// Signature algorithm.
    pub algorithm: Algorithm,
    /// Key used to sign tokens.
    pub encoding_key: EncodingKey,
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("encoding_key", &"[REDACTED]")
            .finish()
    }
}

/// Public verification material decoded from the persisted keypair.
pub struct VerificationMaterial {
    /// Key id of the keypair.
    pub kid: String,
    /// Signature algorithm.
    pub algorithm: Algorithm,
    /// Key used to verify token signatures.
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for VerificationMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationMaterial")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Handle to the gateway's signing keypair.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct KeyStore {
    store: Arc<dyn SigningKeyStore>,
    signing: Cache<&'static str, Arc<SigningMaterial>>,
    verification: Cache<&'static str, Arc<VerificationMaterial>>,
}

impl KeyStore {
    /// Creates a key store over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SigningKeyStore>) -> Self {
        Self {
            store,
            signing: Cache::builder().max_capacity(1).build(),
            verification: Cache::builder().max_capacity(1).build(),
        }
    }

    /// Creates a key store persisting through `backend`.
    #[must_use]
    pub fn from_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self::new(Arc::new(BackendSigningKeyStore::new(backend)))
    }

    /// Generates and persists a keypair unless one already exists.
    ///
    /// Safe to call repeatedly and concurrently: persistence is
    /// insert-if-absent, so racing callers converge on a single keypair and
    /// the losers' freshly generated keys are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyStorage`] if the durable store fails.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_keypair_exists(&self) -> Result<()> {
        if self.store.get_keypair().await?.is_some() {
            tracing::debug!("Signing keypair already present");
            return Ok(());
        }

        let keypair = generate_keypair();
        if self.store.create_keypair(&keypair).await? {
            tracing::info!(
                kid = %keypair.kid,
                algorithm = %keypair.algorithm,
                "Generated signing keypair"
            );
        } else {
            tracing::debug!("Signing keypair created concurrently, keeping existing one");
        }
        Ok(())
    }

    /// Returns the material used to sign tokens.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StoreUnavailable`] if no keypair has been generated
    /// - [`AuthError::InvalidKeyMaterial`] if the persisted private component is unusable
    /// - [`AuthError::KeyStorage`] if the durable store fails
    pub async fn get_private(&self) -> Result<Arc<SigningMaterial>> {
        if let Some(material) = self.signing.get(&ACTIVE_SLOT).await {
            return Ok(material);
        }

        let keypair = self.load().await?;
        let material = Arc::new(signing_material(&keypair)?);
        self.signing.insert(ACTIVE_SLOT, Arc::clone(&material)).await;
        Ok(material)
    }

    /// Returns the material used to verify tokens.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StoreUnavailable`] if no keypair has been generated
    /// - [`AuthError::InvalidKeyMaterial`] if the persisted public component is unusable
    /// - [`AuthError::KeyStorage`] if the durable store fails
    pub async fn get_public(&self) -> Result<Arc<VerificationMaterial>> {
        if let Some(material) = self.verification.get(&ACTIVE_SLOT).await {
            return Ok(material);
        }

        let keypair = self.load().await?;
        let material = Arc::new(verification_material(&keypair)?);
        self.verification.insert(ACTIVE_SLOT, Arc::clone(&material)).await;
        Ok(material)
    }

    async fn load(&self) -> Result<SigningKeyPair> {
        self.store.get_keypair().await?.ok_or(AuthError::StoreUnavailable)
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("cached_signing", &self.signing.entry_count())
            .field("cached_verification", &self.verification.entry_count())
            .finish_non_exhaustive()
    }
}

/// Generates a fresh keypair record with the fixed key id and algorithm.
fn generate_keypair() -> SigningKeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    let seed: Zeroizing<[u8; SECRET_KEY_LENGTH]> = Zeroizing::new(signing_key.to_bytes());

    SigningKeyPair::builder()
        .kid(KEY_ID)
        .algorithm(KEY_ALGORITHM_NAME)
        .private_key(Zeroizing::new(URL_SAFE_NO_PAD.encode(&*seed)))
        .public_key(URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes()))
        .build()
}

/// Wraps a raw Ed25519 seed in a PKCS#8 v1 document.
pub(crate) fn pkcs8_from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Zeroizing<Vec<u8>> {
    let mut der = Zeroizing::new(Vec::with_capacity(PKCS8_ED25519_PREFIX.len() + seed.len()));
    der.extend_from_slice(&PKCS8_ED25519_PREFIX);
    der.extend_from_slice(seed);
    der
}

fn check_algorithm(keypair: &SigningKeyPair) -> Result<Algorithm> {
    validate_algorithm(&keypair.algorithm).map_err(|_| {
        AuthError::invalid_key_material(format!("unsupported algorithm '{}'", keypair.algorithm))
    })?;
    Ok(KEY_ALGORITHM)
}

fn decode_public(keypair: &SigningKeyPair) -> Result<VerifyingKey> {
    let bytes = URL_SAFE_NO_PAD
        .decode(keypair.public_key.as_bytes())
        .map_err(|e| AuthError::invalid_key_material(format!("public key base64: {e}")))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
        AuthError::invalid_key_material(format!(
            "public key: expected {PUBLIC_KEY_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| AuthError::invalid_key_material(format!("public key: {e}")))
}

fn signing_material(keypair: &SigningKeyPair) -> Result<SigningMaterial> {
    let algorithm = check_algorithm(keypair)?;

    let decoded: Zeroizing<Vec<u8>> = Zeroizing::new(
        URL_SAFE_NO_PAD
            .decode(keypair.private_key.as_bytes())
            .map_err(|e| AuthError::invalid_key_material(format!("private key base64: {e}")))?,
    );
    let seed: Zeroizing<[u8; SECRET_KEY_LENGTH]> =
        Zeroizing::new(decoded.as_slice().try_into().map_err(|_| {
            AuthError::invalid_key_material(format!(
                "private key: expected {SECRET_KEY_LENGTH} bytes, got {}",
                decoded.len()
            ))
        })?);

    // A private component that does not belong to the persisted public one
    // would issue tokens nobody can verify.
    let derived = SigningKey::from_bytes(&seed).verifying_key();
    if derived != decode_public(keypair)? {
        return Err(AuthError::invalid_key_material("private and public components do not match"));
    }

    Ok(SigningMaterial {
        kid: keypair.kid.clone(),
        algorithm,
        encoding_key: EncodingKey::from_ed_der(&pkcs8_from_seed(&seed)),
    })
}

fn verification_material(keypair: &SigningKeyPair) -> Result<VerificationMaterial> {
    let algorithm = check_algorithm(keypair)?;
    decode_public(keypair)?;

    let decoding_key = DecodingKey::from_ed_components(&keypair.public_key)
        .map_err(|e| AuthError::invalid_key_material(e.to_string()))?;

    Ok(VerificationMaterial { kid: keypair.kid.clone(), algorithm, decoding_key })
}
