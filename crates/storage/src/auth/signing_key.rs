//! Persisted signing keypair type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The gateway's token signing keypair (Ed25519).
///
/// Both components are stored base64url-encoded without padding, following
/// RFC 7515 (JWS) conventions:
///
/// - `private_key`: the 32-byte Ed25519 seed (43 characters encoded)
/// - `public_key`: the 32-byte Ed25519 verifying key (43 characters encoded)
///
/// `kid` and `algorithm` are fixed when the keypair is generated and are
/// copied into every token header.
///
/// # Example
///
/// ```
/// use keygate_storage::auth::SigningKeyPair;
///
/// let keypair = SigningKeyPair::builder()
///     .kid("deadbeef")
///     .algorithm("EdDSA")
///     .private_key("c2VlZA".to_owned())
///     .public_key("cHVibGlj")
///     .build();
///
/// assert_eq!(keypair.kid, "deadbeef");
/// assert!(!format!("{keypair:?}").contains("c2VlZA"));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct SigningKeyPair {
    /// Key ID, written to the `kid` header of issued tokens.
    #[builder(into)]
    pub kid: String,

    /// JWS algorithm name (`EdDSA`).
    #[builder(into)]
    pub algorithm: String,

    /// Ed25519 seed, base64url-encoded.
    ///
    /// Wrapped in [`Zeroizing`] so the encoded secret is scrubbed from memory
    /// when the record is dropped.
    #[builder(into)]
    pub private_key: Zeroizing<String>,

    /// Ed25519 verifying key, base64url-encoded.
    #[builder(into)]
    pub public_key: String,

    /// When the keypair was generated.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> SigningKeyPair {
        SigningKeyPair::builder()
            .kid("deadbeef")
            .algorithm("EdDSA")
            .private_key("secret-seed".to_owned())
            .public_key("public-part")
            .build()
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("deadbeef"));
        assert!(rendered.contains("public-part"));
        assert!(!rendered.contains("secret-seed"));
    }

    #[test]
    fn test_json_shape() {
        let keypair = sample();
        let value = serde_json::to_value(&keypair).unwrap();

        assert_eq!(value["kid"], "deadbeef");
        assert_eq!(value["algorithm"], "EdDSA");
        assert_eq!(value["private_key"], "secret-seed");
        assert_eq!(value["public_key"], "public-part");
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["rotated_at"] = serde_json::json!("2026-01-01T00:00:00Z");

        assert!(serde_json::from_value::<SigningKeyPair>(value).is_err());
    }
}
