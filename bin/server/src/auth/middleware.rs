//! Authentication extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use ssogate_access::OidcSession;
use std::sync::Arc;

use super::{AppState, flow, routes::load_session};

/// Path of the login route.
const LOGIN_PATH: &str = "/auth/oidc/login";

/// Extractor for requiring a browser logged in through the active provider.
///
/// Unauthenticated callers are redirected to the login route with the
/// requested path as the return target.
pub struct RequireOidcSession(pub OidcSession);

impl<S> FromRequestParts<S> for RequireOidcSession
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = OidcRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        if !flow::is_enabled(&app_state.config) {
            return Err(OidcRejection::Disabled);
        }

        let jar = match CookieJar::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };
        let (_, session) = load_session(&app_state, &jar).await;

        if !flow::is_session_valid(&app_state.config, &app_state.provider_ctx, &session) {
            let target = parts
                .uri
                .path_and_query()
                .map_or("/", |pq| pq.as_str())
                .to_string();
            return Err(OidcRejection::NotAuthenticated { target });
        }

        Ok(RequireOidcSession(session))
    }
}

/// Rejection type for [`RequireOidcSession`].
#[derive(Debug, PartialEq, Eq)]
pub enum OidcRejection {
    NotAuthenticated { target: String },
    Disabled,
}

impl OidcRejection {
    /// Login URL that returns to the rejected path afterwards.
    #[must_use]
    pub fn login_url(target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!("{LOGIN_PATH}?to={encoded}")
    }
}

impl IntoResponse for OidcRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated { target } => (
                StatusCode::FOUND,
                [(axum::http::header::LOCATION, Self::login_url(&target))],
            )
                .into_response(),
            Self::Disabled => (StatusCode::FORBIDDEN, "Single sign-on is not configured").into_response(),
        }
    }
}
