//! Shared test utilities for authentication testing.
//!
//! This module provides helpers for building a fully wired key store and
//! token service on a [`MemoryBackend`], signing tokens with arbitrary claims
//! or with a foreign key, and crafting raw JWT strings (for attack testing).
//! It is feature-gated behind `testutil` to prevent leaking into production
//! builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keygate-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keygate_authn::testutil::{craft_raw_jwt, generate_test_keypair};
//! ```

use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use keygate_storage::MemoryBackend;
use rand_core::OsRng;
use serde_json::json;
use zeroize::Zeroizing;

use crate::{
    keys::{KEY_ID, KeyStore, pkcs8_from_seed},
    token::{AUDIENCE, ISSUER, SUBJECT, TokenService},
};

/// Generates a test Ed25519 key pair.
///
/// Returns `(pkcs8_der, public_key_base64url)` where:
/// - `pkcs8_der` is the private key in PKCS#8 DER format wrapped in [`Zeroizing`] (suitable for
///   [`EncodingKey::from_ed_der`])
/// - `public_key_base64url` is the 32-byte public key encoded as base64url without padding
///
/// Each call generates a fresh random key pair.
pub fn generate_test_keypair() -> (Zeroizing<Vec<u8>>, String) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());
    let seed: Zeroizing<[u8; 32]> = Zeroizing::new(signing_key.to_bytes());

    (pkcs8_from_seed(&seed), public_key_b64)
}

/// A key store with a generated keypair and a token service on top of it,
/// both backed by the returned [`MemoryBackend`].
///
/// # Panics
///
/// Panics if keypair generation fails or `token_ttl` is under one second.
pub async fn token_service(token_ttl: Duration) -> (MemoryBackend, Arc<KeyStore>, TokenService) {
    let backend = MemoryBackend::new();
    let keys = Arc::new(KeyStore::from_backend(Arc::new(backend.clone())));
    keys.ensure_keypair_exists().await.expect("generate keypair");
    let tokens = TokenService::new(Arc::clone(&keys), token_ttl).expect("token service");
    (backend, keys, tokens)
}

/// Standard claims with the gateway's issuer, audience and subject, issued
/// now and expiring after `ttl_secs` (negative values produce expired claims).
pub fn standard_claims(ttl_secs: i64) -> serde_json::Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": SUBJECT,
        "iat": now,
        "exp": now + ttl_secs,
    })
}

/// Signs `claims` with the gateway's active private key under the
/// gateway's `kid`.
///
/// # Panics
///
/// Panics if the key store has no keypair or encoding fails.
pub async fn sign_with_active_key(keys: &KeyStore, claims: &serde_json::Value) -> String {
    let material = keys.get_private().await.expect("active signing key");
    let mut header = Header::new(material.algorithm);
    header.kid = Some(material.kid.clone());
    jsonwebtoken::encode(&header, claims, &material.encoding_key).expect("encode test JWT")
}

/// Signs `claims` with an unrelated Ed25519 key that claims the gateway's
/// `kid`.
///
/// # Panics
///
/// Panics if encoding fails.
pub fn sign_with_foreign_key(claims: &serde_json::Value) -> String {
    let (pkcs8_der, _) = generate_test_keypair();
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(KEY_ID.to_owned());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(&pkcs8_der))
        .expect("encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Flips one bit of the signature segment of `token`.
///
/// `bit` is taken modulo the signature's bit length.
///
/// # Panics
///
/// Panics if `token` is not a three-segment JWS with a decodable signature.
pub fn flip_signature_bit(token: &str, bit: usize) -> String {
    let (message, signature) = token.rsplit_once('.').expect("three-segment token");
    let mut raw = URL_SAFE_NO_PAD.decode(signature).expect("base64url signature");
    let bit = bit % (raw.len() * 8);
    raw[bit / 8] ^= 1 << (bit % 8);
    format!("{message}.{}", URL_SAFE_NO_PAD.encode(raw))
}

/// Asserts that a [`Result<T, AuthError>`](crate::AuthError) is an `Err` matching the given
/// [`AuthError`](crate::AuthError) variant.
///
/// Works with any `AuthError` variant. On failure, prints the expected variant
/// and the actual result for debugging.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keygate_authn::assert_auth_error;
/// use keygate_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::TokenExpired);
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
