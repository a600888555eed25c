//! Resources behind the access gate.

use axum::{Extension, Json};
use keygate_authn::TokenClaims;
use serde::Serialize;

/// Body of `GET /private/resource`.
#[derive(Debug, Serialize)]
pub struct Resource {
    /// The protected payload.
    pub data: &'static str,
}

/// `GET /private/resource`.
///
/// Only reachable through [`require_token`](crate::middleware::require_token),
/// which places the verified claims in the request extensions.
pub async fn resource(Extension(claims): Extension<TokenClaims>) -> Json<Resource> {
    tracing::debug!(sub = %claims.sub, "Serving protected resource");
    Json(Resource { data: "secret-data" })
}
