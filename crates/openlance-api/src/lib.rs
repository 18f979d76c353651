//! # openlance-api — HTTP Surface
//!
//! Axum server for the Openlance marketplace core: jobs, dispute
//! arbitration, and two-phase escrow settlement.
//!
//! ## Router layout
//!
//! Read endpoints, the health probe, the OpenAPI spec, and the ledger
//! webhook are public. Every mutation sits behind the bearer-token
//! middleware ([`auth::auth_middleware`]); the webhook authenticates by
//! oracle signature instead of bearer token.

pub mod auth;
pub mod error;
pub mod notify;
pub mod openapi;
pub mod reconcile;
pub mod routes;
pub mod service;
pub mod state;
pub mod webhook;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Maximum accepted request body size (2 MiB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks that the store lock is acquirable (not deadlocked). The settlement
/// gateway is deliberately not probed: a flapping RPC endpoint should fail
/// individual confirm-tx requests, not take the whole service out of
/// rotation.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if !state.store.is_responsive() {
        return (StatusCode::SERVICE_UNAVAILABLE, "store locked").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let public = Router::new()
        .merge(routes::jobs::public_router())
        .merge(routes::disputes::public_router())
        .merge(openapi::router())
        .route(
            "/v1/disputes/webhook/on-chain-update",
            post(webhook::on_chain_update),
        )
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    let protected = Router::new()
        .merge(routes::jobs::router())
        .merge(routes::disputes::router())
        .merge(routes::escrow::router())
        .layer(axum::middleware::from_fn(auth::auth_middleware));

    public
        .merge(protected)
        .layer(Extension(auth_config))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
