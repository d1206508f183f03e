//! ssogate web server.
//!
//! This crate hosts the federated login flow: provider adapters, the
//! login/callback orchestrator, session storage and the Axum routes that
//! expose them.

pub mod auth;
pub mod config;
pub mod error;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

use auth::{AppState, RequireOidcSession};

/// Builds the full application router.
///
/// `/` is the protected landing page; everything under `/auth/oidc` is
/// public.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .merge(auth::router())
        .with_state(state)
}

async fn home(RequireOidcSession(session): RequireOidcSession) -> Json<Value> {
    Json(json!({
        "provider": session.provider(),
        "subject": session.subject(),
        "email": session.email(),
    }))
}
