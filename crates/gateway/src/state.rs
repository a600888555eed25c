//! Shared application state.

use std::sync::Arc;

use keygate_authn::{AccessGate, AuthError, ChallengeAuthenticator, KeyStore, TokenService};
use keygate_storage::{ChallengeStore, StorageBackend};

use crate::config::Config;

/// Components shared by every handler.
///
/// All components are built explicitly from a [`Config`] and one durable
/// backend; nothing is looked up globally.
#[derive(Clone)]
pub struct AppState {
    /// Challenge issuance and verification.
    pub authenticator: Arc<ChallengeAuthenticator>,
    /// Token issuance.
    pub tokens: Arc<TokenService>,
    /// Admission decision for protected routes.
    pub gate: AccessGate,
    /// Pending challenges, shared with the sweeper.
    pub challenges: Arc<ChallengeStore>,
    /// Durable store, probed by the health endpoint.
    pub backend: Arc<dyn StorageBackend>,
}

impl AppState {
    /// Wires the components over `backend` and makes sure a signing keypair
    /// exists before any request can be served.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the configuration is rejected by a component
    /// or the keypair cannot be generated.
    #[tracing::instrument(skip_all)]
    pub async fn bootstrap(
        config: &Config,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self, AuthError> {
        let keys = Arc::new(KeyStore::from_backend(Arc::clone(&backend)));
        keys.ensure_keypair_exists().await?;

        let challenges = Arc::new(ChallengeStore::new(Arc::clone(&backend)));
        let authenticator = ChallengeAuthenticator::builder()
            .store(Arc::clone(&challenges))
            .secret(config.auth_secret.clone())
            .ttl(config.challenge_ttl())
            .length(config.challenge_length)
            .single_use(config.single_use_challenges)
            .build()?;
        let tokens = Arc::new(TokenService::new(keys, config.token_ttl())?);

        Ok(Self {
            authenticator: Arc::new(authenticator),
            gate: AccessGate::new(Arc::clone(&tokens)),
            tokens,
            challenges,
            backend,
        })
    }
}
