//! Token issuance and verification.
//!
//! Tokens are compact JWS (JWT) values signed with the gateway's Ed25519
//! key. They are never stored server-side; validity is a pure function of
//! the signature, the fixed issuer and audience, and the current time.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use jsonwebtoken::{Header, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};

use crate::{
    challenge::MAX_TTL,
    error::{AuthError, Result},
    keys::KeyStore,
    validation::validate_algorithm,
};

/// `iss` of every token this gateway issues and accepts.
pub const ISSUER: &str = "sample.server";

/// `aud` of every token this gateway issues and accepts.
pub const AUDIENCE: &str = "api";

/// `sub` given to clients that completed the challenge exchange.
pub const SUBJECT: &str = "deadbeef";

/// Claims carried by a gateway token.
///
/// Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Subject.
    pub sub: String,
    /// Issued at.
    pub iat: u64,
    /// Expiry; the token is accepted while `now <= exp`.
    pub exp: u64,
}

/// Issues and verifies signed, time-bound tokens.
#[derive(Debug)]
pub struct TokenService {
    keys: Arc<KeyStore>,
    ttl: Duration,
}

impl TokenService {
    /// Creates a token service signing with `keys`; issued tokens live for
    /// `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if `ttl` is shorter than
    /// one second, since token timestamps have one-second resolution, or
    /// longer than [`MAX_TTL`].
    pub fn new(keys: Arc<KeyStore>, ttl: Duration) -> Result<Self> {
        if ttl.as_secs() == 0 {
            return Err(AuthError::invalid_configuration("token TTL must be at least one second"));
        }
        if ttl > MAX_TTL {
            return Err(AuthError::invalid_configuration(format!(
                "token TTL must not exceed {} seconds",
                MAX_TTL.as_secs()
            )));
        }
        Ok(Self { keys, ttl })
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `subject`, valid from now for the configured TTL.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StoreUnavailable`] if no signing keypair exists
    /// - [`AuthError::InvalidKeyMaterial`] if the keypair cannot sign
    /// - [`AuthError::KeyStorage`] if the store fails
    #[tracing::instrument(skip(self))]
    pub async fn issue(&self, subject: &str) -> Result<String> {
        let material = self.keys.get_private().await?;

        let iat = u64::try_from(Utc::now().timestamp())
            .map_err(|_| AuthError::invalid_configuration("system clock is before the epoch"))?;
        let exp = iat
            .checked_add(self.ttl.as_secs())
            .ok_or_else(|| AuthError::invalid_configuration("token TTL overflows expiry"))?;

        let claims = TokenClaims {
            iss: ISSUER.to_owned(),
            aud: AUDIENCE.to_owned(),
            sub: subject.to_owned(),
            iat,
            exp,
        };

        let mut header = Header::new(material.algorithm);
        header.kid = Some(material.kid.clone());

        let token = jsonwebtoken::encode(&header, &claims, &material.encoding_key)?;
        tracing::debug!(kid = %material.kid, exp, "Issued token");
        Ok(token)
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Checks, in order: header decodes, algorithm is accepted, `kid`
    /// names the active key, signature verifies, `iss` and `aud` match, and
    /// `exp` is present and not in the past. No clock leeway is applied.
    ///
    /// # Errors
    ///
    /// Token problems are reported as [`AuthError::TokenMalformed`],
    /// [`AuthError::UnsupportedAlgorithm`], [`AuthError::TokenSignatureInvalid`],
    /// [`AuthError::TokenClaimInvalid`] or [`AuthError::TokenExpired`].
    /// Failures loading the public key are reported as the key store's error.
    #[tracing::instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<TokenClaims> {
        let header = decode_header(token)?;
        validate_algorithm(&format!("{:?}", header.alg))?;

        let material = self.keys.get_public().await?;
        match header.kid.as_deref() {
            Some(kid) if kid == material.kid => {},
            Some(_) => return Err(AuthError::token_claim_invalid("kid")),
            None => return Err(AuthError::token_malformed("header missing 'kid'")),
        }

        let mut validation = Validation::new(material.algorithm);
        validation.leeway = 0;
        validation.validate_nbf = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = decode::<TokenClaims>(token, &material.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Returns `true` if `token` verifies.
    ///
    /// Every failure, including failure to load the public key, is reported
    /// as `false`; the reason is only logged at `debug`.
    pub async fn validate(&self, token: &str) -> bool {
        match self.verify(token).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(reason = e.kind(), "Token rejected");
                false
            },
        }
    }
}
