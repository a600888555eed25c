//! Authentication error types.
//!
//! This module defines errors that can occur while issuing and redeeming
//! challenges, managing the signing keypair, and issuing or verifying tokens.
//!
//! Token failures are deliberately fine-grained here for logging; the
//! service boundary ([`TokenService::validate`](crate::TokenService::validate)
//! and the [`AccessGate`](crate::AccessGate)) collapses them into a single
//! "invalid" outcome.

use keygate_storage::StorageError;
use thiserror::Error;

/// Errors produced by the authentication components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No signing keypair has been generated yet.
    #[error("Signing keypair not available")]
    StoreUnavailable,

    /// The challenge was never issued, was already removed, or has expired.
    #[error("Challenge not found or expired")]
    ChallengeNotFoundOrExpired,

    /// The submitted response does not match the expected hash.
    #[error("Challenge response mismatch")]
    ChallengeResponseMismatch,

    /// Token is not a decodable signed token.
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    /// Token signature does not verify under the public key.
    #[error("Invalid token signature")]
    TokenSignatureInvalid,

    /// A required claim is missing or does not hold the expected value.
    #[error("Invalid token claim: {0}")]
    TokenClaimInvalid(String),

    /// Token `exp` is in the past.
    #[error("Token expired")]
    TokenExpired,

    /// Token header names an algorithm outside the accepted set.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The persisted keypair cannot be turned into signing or verification keys.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// A component was constructed with parameters it cannot work with.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The durable store failed.
    #[error("Key storage error: {0}")]
    KeyStorage(#[source] StorageError),
}

impl AuthError {
    /// Creates a [`AuthError::TokenMalformed`] error.
    #[must_use]
    pub fn token_malformed(message: impl Into<String>) -> Self {
        Self::TokenMalformed(message.into())
    }

    /// Creates a [`AuthError::TokenClaimInvalid`] error.
    #[must_use]
    pub fn token_claim_invalid(message: impl Into<String>) -> Self {
        Self::TokenClaimInvalid(message.into())
    }

    /// Creates a [`AuthError::InvalidKeyMaterial`] error.
    #[must_use]
    pub fn invalid_key_material(message: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial(message.into())
    }

    /// Creates a [`AuthError::InvalidConfiguration`] error.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Returns `true` for failures that say something about the token itself
    /// rather than about the gateway's own state.
    #[must_use]
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::TokenMalformed(_)
                | Self::TokenSignatureInvalid
                | Self::TokenClaimInvalid(_)
                | Self::TokenExpired
                | Self::UnsupportedAlgorithm(_)
        )
    }

    /// Returns `true` for failures of a challenge-response attempt.
    #[must_use]
    pub fn is_challenge_rejection(&self) -> bool {
        matches!(self, Self::ChallengeNotFoundOrExpired | Self::ChallengeResponseMismatch)
    }

    /// Short, stable name of the variant for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable => "store_unavailable",
            Self::ChallengeNotFoundOrExpired => "challenge_not_found_or_expired",
            Self::ChallengeResponseMismatch => "challenge_response_mismatch",
            Self::TokenMalformed(_) => "token_malformed",
            Self::TokenSignatureInvalid => "token_signature_invalid",
            Self::TokenClaimInvalid(_) => "token_claim_invalid",
            Self::TokenExpired => "token_expired",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::InvalidKeyMaterial(_) => "invalid_key_material",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::KeyStorage(_) => "key_storage",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::TokenSignatureInvalid,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidIssuer => AuthError::token_claim_invalid("iss"),
            ErrorKind::InvalidAudience => AuthError::token_claim_invalid("aud"),
            ErrorKind::InvalidSubject => AuthError::token_claim_invalid("sub"),
            ErrorKind::ImmatureSignature => AuthError::token_claim_invalid("nbf"),
            ErrorKind::MissingRequiredClaim(claim) => AuthError::token_claim_invalid(claim.clone()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::UnsupportedAlgorithm("algorithm not accepted".into())
            },
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm => AuthError::invalid_key_material(err.to_string()),
            _ => AuthError::token_malformed(err.to_string()),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::KeyStorage(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
