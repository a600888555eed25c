//! Challenge-response authentication.
//!
//! A client obtains a random challenge, proves knowledge of the shared
//! secret by returning `hex(sha256(secret ‖ challenge))`, and is then
//! eligible for a token. The secret itself never crosses the wire.
//!
//! ```text
//! issue_challenge ──► ChallengeStore::put(challenge, ttl)
//!
//! authenticate(challenge, response)
//!   ├─ malformed challenge ─────────────► ChallengeNotFoundOrExpired
//!   ├─ ChallengeStore::is_valid == false ► ChallengeNotFoundOrExpired
//!   ├─ response != expected ────────────► ChallengeResponseMismatch
//!   ├─ single_use && !consume ──────────► ChallengeNotFoundOrExpired
//!   └─ Ok(())
//! ```
//!
//! Deleting the challenge after a failed attempt is the caller's policy; see
//! [`ChallengeAuthenticator::delete_challenge`].

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use keygate_storage::ChallengeStore;
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Largest accepted challenge length in random bytes.
///
/// Keeps the hex-encoded storage key within what file-backed stores accept.
pub const MAX_CHALLENGE_LENGTH: usize = 64;

/// Longest accepted challenge or token lifetime (ten years).
///
/// Keeps `now + ttl` representable as a timestamp.
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// A freshly issued challenge, as shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedChallenge {
    /// Lower-case hex challenge value.
    pub challenge: String,
    /// Instant after which the challenge is no longer redeemable.
    pub valid_until: DateTime<Utc>,
}

/// Issues challenges and verifies responses to them.
pub struct ChallengeAuthenticator {
    store: Arc<ChallengeStore>,
    secret: Zeroizing<String>,
    ttl: Duration,
    length: usize,
    single_use: bool,
}

#[bon::bon]
impl ChallengeAuthenticator {
    /// Creates an authenticator.
    ///
    /// `length` is the number of random bytes per challenge; the challenge
    /// string is twice as long. With `single_use` set, a successful
    /// [`authenticate`](Self::authenticate) also removes the challenge.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if the secret is empty,
    /// `ttl` is zero or above [`MAX_TTL`], or `length` is outside
    /// `1..=MAX_CHALLENGE_LENGTH`.
    #[builder]
    pub fn new(
        store: Arc<ChallengeStore>,
        #[builder(into)] secret: Zeroizing<String>,
        ttl: Duration,
        length: usize,
        #[builder(default)] single_use: bool,
    ) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::invalid_configuration("shared secret must not be empty"));
        }
        if ttl.is_zero() {
            return Err(AuthError::invalid_configuration("challenge TTL must be positive"));
        }
        if ttl > MAX_TTL {
            return Err(AuthError::invalid_configuration(format!(
                "challenge TTL must not exceed {} seconds",
                MAX_TTL.as_secs()
            )));
        }
        if !(1..=MAX_CHALLENGE_LENGTH).contains(&length) {
            return Err(AuthError::invalid_configuration(format!(
                "challenge length must be between 1 and {MAX_CHALLENGE_LENGTH}, got {length}"
            )));
        }
        Ok(Self { store, secret, ttl, length, single_use })
    }
}

impl ChallengeAuthenticator {
    /// Draws a new random challenge and stores it with the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyStorage`] if the challenge cannot be persisted.
    #[tracing::instrument(skip(self), fields(ttl_secs = self.ttl.as_secs()))]
    pub async fn issue_challenge(&self) -> Result<IssuedChallenge> {
        let mut bytes = vec![0u8; self.length];
        OsRng.fill_bytes(&mut bytes);
        let challenge = hex::encode(&bytes);

        let record = self.store.put(&challenge, self.ttl).await?;
        tracing::debug!(valid_until = %record.expires_at, "Issued challenge");
        Ok(IssuedChallenge { challenge, valid_until: record.expires_at })
    }

    /// Computes the response a client holding `secret` must return for
    /// `challenge`: `hex(sha256(secret ‖ challenge))`.
    ///
    /// # Examples
    ///
    /// ```
    /// use keygate_authn::ChallengeAuthenticator;
    ///
    /// let response = ChallengeAuthenticator::expected_response("secret", "abcd");
    /// assert_eq!(response.len(), 64);
    /// ```
    #[must_use]
    pub fn expected_response(secret: &str, challenge: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(challenge.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Checks `response` against an outstanding `challenge`.
    ///
    /// The challenge is left in place on failure; callers delete it with
    /// [`delete_challenge`](Self::delete_challenge) so that it cannot be
    /// guessed against again.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ChallengeNotFoundOrExpired`] if the challenge was never issued, is
    ///   malformed, has expired, or (in single-use mode) was redeemed concurrently
    /// - [`AuthError::ChallengeResponseMismatch`] if the response is wrong
    /// - [`AuthError::KeyStorage`] if the store fails
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, challenge: &str, response: &str) -> Result<()> {
        if !self.is_well_formed(challenge) {
            return Err(AuthError::ChallengeNotFoundOrExpired);
        }
        if !self.store.is_valid(challenge).await? {
            return Err(AuthError::ChallengeNotFoundOrExpired);
        }

        let expected = Zeroizing::new(Self::expected_response(&self.secret, challenge));
        if !bool::from(expected.as_bytes().ct_eq(response.as_bytes())) {
            return Err(AuthError::ChallengeResponseMismatch);
        }

        if self.single_use && !self.store.consume(challenge).await? {
            return Err(AuthError::ChallengeNotFoundOrExpired);
        }
        Ok(())
    }

    /// Like [`authenticate`](Self::authenticate), but reports rejection as
    /// `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Only store failures are returned as errors.
    pub async fn verify_response(&self, challenge: &str, response: &str) -> Result<bool> {
        match self.authenticate(challenge, response).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_challenge_rejection() => {
                tracing::debug!(reason = e.kind(), "Challenge response rejected");
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    /// Removes `challenge`; a no-op if it is not outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyStorage`] if the store fails.
    pub async fn delete_challenge(&self, challenge: &str) -> Result<()> {
        if !self.is_well_formed(challenge) {
            return Ok(());
        }
        self.store.delete(challenge).await?;
        Ok(())
    }

    /// Whether successful responses also consume the challenge.
    #[must_use]
    pub fn single_use(&self) -> bool {
        self.single_use
    }

    /// Lifetime of issued challenges.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issued challenges are exactly `2 * length` lower-case hex digits;
    /// anything else was never issued by this authenticator.
    fn is_well_formed(&self, challenge: &str) -> bool {
        challenge.len() == self.length * 2
            && challenge.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Debug for ChallengeAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeAuthenticator")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("length", &self.length)
            .field("single_use", &self.single_use)
            .finish_non_exhaustive()
    }
}
