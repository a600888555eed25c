//! Access Gate: admission decision for protected resources.
//!
//! ```text
//! header absent ──────────────► MissingToken
//! header present ─► verify ─┬─► Ok(claims)        forward
//!                           ├─► token rejected    InvalidToken
//!                           └─► no usable key     Unavailable
//! ```
//!
//! The gate never reports which token check failed. A public key that cannot
//! be loaded is the gateway's fault, not the client's, so it is kept apart as
//! [`GateRejection::Unavailable`].

use std::sync::Arc;

use thiserror::Error;

use crate::{
    error::AuthError,
    token::{TokenClaims, TokenService},
};

/// Request header carrying the token (matched case-insensitively by HTTP).
pub const TOKEN_HEADER: &str = "x-token";

/// Why a request was not admitted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GateRejection {
    /// The request carried no token header.
    #[error("missing {TOKEN_HEADER} header")]
    MissingToken,

    /// The token failed verification.
    #[error("invalid token")]
    InvalidToken,

    /// Verification could not run because the public key could not be loaded.
    #[error("token verification unavailable: {0}")]
    Unavailable(#[source] AuthError),
}

/// Decides whether a protected request may proceed.
#[derive(Debug, Clone)]
pub struct AccessGate {
    tokens: Arc<TokenService>,
}

impl AccessGate {
    /// Creates a gate that verifies tokens with `tokens`.
    #[must_use]
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Admits a request given the value of its token header, if any.
    ///
    /// # Errors
    ///
    /// Returns the [`GateRejection`] the request should be answered with.
    pub async fn admit(&self, header: Option<&str>) -> Result<TokenClaims, GateRejection> {
        let Some(token) = header else {
            return Err(GateRejection::MissingToken);
        };

        match self.tokens.verify(token).await {
            Ok(claims) => Ok(claims),
            Err(
                e @ (AuthError::KeyStorage(_)
                | AuthError::StoreUnavailable
                | AuthError::InvalidKeyMaterial(_)),
            ) => {
                tracing::error!(error = %e, "Public key unavailable for token verification");
                Err(GateRejection::Unavailable(e))
            },
            Err(e) => {
                tracing::debug!(reason = e.kind(), "Token rejected at gate");
                Err(GateRejection::InvalidToken)
            },
        }
    }
}
