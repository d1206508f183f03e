//! Federated login for the ssogate server.
//!
//! This module provides:
//! - Identity provider adapters (generic OIDC, named OIDC providers, GitHub)
//! - The login/callback orchestrator over [`OidcSession`](ssogate_access::OidcSession)
//! - Server-side session storage keyed by an opaque cookie
//! - Routes and an extractor for Axum
//!
//! # Trust levels
//!
//! Providers built on the OIDC engine verify a signed ID token against the
//! issuer's published keys. The GitHub adapter only reads a REST profile
//! with an access token, so its claims are marked
//! [`Assurance::OAuthProfile`](ssogate_core::Assurance) and the two levels
//! are never merged.

pub mod flow;
pub mod github;
pub mod middleware;
pub mod oidc;
pub mod provider;
pub mod routes;
pub mod store;

use axum::{Router, routing::get};
use ssogate_access::OidcConfig;
use std::sync::Arc;

use crate::config::SessionConfig;

pub use flow::{CallbackError, LoginError, LoginSuccess};
pub use middleware::{OidcRejection, RequireOidcSession};
pub use provider::{IdentityProvider, Provider, ProviderContext, active_provider, new_provider};
pub use routes::{callback, login, logout, status};
pub use store::{MemorySessionStore, SessionStore};

/// Shared application state.
pub struct AppState {
    /// Active provider, per-provider settings and claim filters.
    pub config: OidcConfig,
    /// Deployment facts and the outbound HTTP client.
    pub provider_ctx: ProviderContext,
    /// Server-side session records.
    pub sessions: Arc<dyn SessionStore>,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        config: OidcConfig,
        provider_ctx: ProviderContext,
        sessions: Arc<dyn SessionStore>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            config,
            provider_ctx,
            sessions,
            session_config,
        }
    }
}

/// Routes under `/auth/oidc`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/oidc/login", get(login))
        .route("/auth/oidc/callback", get(callback))
        .route("/auth/oidc/logout", get(logout))
        .route("/auth/oidc/status", get(status))
}
