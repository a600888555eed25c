//! # keygate authentication
//!
//! Challenge-response authentication, token issuance and access gating for
//! the keygate gateway.
//!
//! This crate provides:
//! - **Key store**: the single Ed25519 signing keypair, generated once and cached
//! - **Challenge-response**: random challenges answered with `sha256(secret ‖ challenge)`
//! - **Token service**: signed, time-bound tokens with fixed issuer and audience
//! - **Access gate**: the admit/reject decision for protected requests
//!
//! ## Features
//!
//! - Only EdDSA is accepted; `none` and HMAC algorithms are explicitly rejected
//! - Token failures collapse to a single "invalid" outcome at the gate
//! - Response comparison is constant-time
//!
//! ## Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use keygate_authn::{AccessGate, ChallengeAuthenticator, KeyStore, SUBJECT, TokenService};
//! use keygate_storage::{ChallengeStore, MemoryBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(MemoryBackend::new());
//!
//! let keys = Arc::new(KeyStore::from_backend(backend.clone()));
//! keys.ensure_keypair_exists().await?;
//!
//! let authenticator = ChallengeAuthenticator::builder()
//!     .store(Arc::new(ChallengeStore::new(backend)))
//!     .secret("shared-secret".to_owned())
//!     .ttl(Duration::from_secs(30))
//!     .length(16)
//!     .build()?;
//! let tokens = Arc::new(TokenService::new(keys, Duration::from_secs(300))?);
//!
//! let issued = authenticator.issue_challenge().await?;
//! let response = ChallengeAuthenticator::expected_response("shared-secret", &issued.challenge);
//! authenticator.authenticate(&issued.challenge, &response).await?;
//!
//! let token = tokens.issue(SUBJECT).await?;
//! let claims = AccessGate::new(tokens).admit(Some(&token)).await?;
//! assert_eq!(claims.sub, SUBJECT);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Challenge-response authenticator.
pub mod challenge;
/// Authentication error types.
pub mod error;
/// Access gate for protected requests.
pub mod gate;
/// Signing keypair management.
pub mod keys;
/// Test helpers (requires the `testutil` feature).
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
/// Token issuance and verification.
pub mod token;
/// Algorithm validation.
pub mod validation;

// Re-export key types for convenience
pub use challenge::{ChallengeAuthenticator, IssuedChallenge, MAX_CHALLENGE_LENGTH, MAX_TTL};
pub use error::{AuthError, Result};
pub use gate::{AccessGate, GateRejection, TOKEN_HEADER};
pub use keys::{KEY_ALGORITHM, KEY_ID, KeyStore, SigningMaterial, VerificationMaterial};
pub use token::{AUDIENCE, ISSUER, SUBJECT, TokenClaims, TokenService};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
