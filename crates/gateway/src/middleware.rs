//! Request middleware.
//!
//! - [`require_token`]: the access gate, layered on the protected routes only
//! - [`request_id`]: tags every response with a fresh `x-request-id`

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use keygate_authn::TOKEN_HEADER;
use tracing::Instrument;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Rejects requests without a valid token; otherwise forwards them with the
/// verified [`TokenClaims`](keygate_authn::TokenClaims) in the request
/// extensions and returns the handler's response unchanged.
///
/// # Errors
///
/// [`ApiError::MissingToken`], [`ApiError::InvalidToken`], or
/// [`ApiError::Internal`] if the public key cannot be loaded.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match request.headers().get(TOKEN_HEADER) {
        None => None,
        // A token is base64url text; anything else cannot verify.
        Some(value) => Some(value.to_str().map_err(|_| ApiError::InvalidToken)?.to_owned()),
    };

    let claims = state.gate.admit(token.as_deref()).await?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Assigns a UUIDv4 request id, recorded on the request's tracing span and
/// returned to clients as the `x-request-id` response header.
pub async fn request_id(request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();

    let span = tracing::info_span!("request", request_id = %id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
