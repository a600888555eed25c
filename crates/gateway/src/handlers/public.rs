//! `/public/token` handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use keygate_authn::{IssuedChallenge, SUBJECT};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

/// Body of `POST /public/token`.
#[derive(Debug, Deserialize)]
pub struct SolvedChallenge {
    /// Challenge previously issued by `GET /public/token`.
    pub challenge: String,
    /// `hex(sha256(secret ‖ challenge))`.
    pub response: String,
}

/// Body returned on a successful exchange.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Signed access token, sent back in the `x-token` header.
    pub token: String,
}

/// `GET /public/token`: issues a fresh challenge.
///
/// # Errors
///
/// [`ApiError::Internal`] if the challenge cannot be persisted.
pub async fn issue_challenge(
    State(state): State<AppState>,
) -> Result<Json<IssuedChallenge>, ApiError> {
    Ok(Json(state.authenticator.issue_challenge().await?))
}

/// `POST /public/token`: exchanges a solved challenge for a token.
///
/// A wrong response burns the challenge, so each challenge allows a single
/// failed attempt.
///
/// # Errors
///
/// - [`ApiError::InvalidBody`] if the body is not a JSON [`SolvedChallenge`]
/// - [`ApiError::InvalidChallengeResponse`] if the challenge is unknown,
///   expired, or answered wrongly
/// - [`ApiError::Internal`] on storage or signing failures
pub async fn exchange_token(
    State(state): State<AppState>,
    body: Result<Json<SolvedChallenge>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(body) = body?;
    let authenticator = &state.authenticator;

    if !authenticator.verify_response(&body.challenge, &body.response).await? {
        authenticator.delete_challenge(&body.challenge).await?;
        return Err(ApiError::InvalidChallengeResponse);
    }

    let token = state.tokens.issue(SUBJECT).await?;
    Ok(Json(TokenResponse { token }))
}
