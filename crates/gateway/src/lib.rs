//! HTTP front end of the keygate authentication gateway.
//!
//! # Routes
//!
//! | Method | Path | Access | Response |
//! |--------|------|--------|----------|
//! | `GET` | `/public/token` | open | `{"challenge", "valid_until"}` |
//! | `POST` | `/public/token` | open | `{"token"}` or 401 |
//! | `GET` | `/private/resource` | `x-token` | `{"data"}` or 403 |
//! | `GET` | `/health` | open | `{"status"}` |
//!
//! A client fetches a challenge, answers it with
//! `hex(sha256(secret ‖ challenge))`, and presents the returned token in the
//! `x-token` header on protected routes.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use state::AppState;

/// Builds the gateway router over `state`.
pub fn router(state: AppState) -> Router {
    let public = Router::new().route(
        "/token",
        get(handlers::public::issue_challenge).post(handlers::public::exchange_token),
    );

    let private = Router::new()
        .route("/resource", get(handlers::private::resource))
        .layer(from_fn_with_state(state.clone(), middleware::require_token));

    Router::new()
        .nest("/public", public)
        .nest("/private", private)
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::request_id))
        .with_state(state)
}
