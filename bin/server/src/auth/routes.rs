//! Authentication routes for login, callback, logout and status.

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, Query, State},
    http::{StatusCode, header::LOCATION, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use ssogate_access::{OidcSession, SessionId, parse_bool_query};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{debug, error, info, warn};

use super::{AppState, flow};
use crate::config::SessionConfig;

/// Query parameters accepted by the login route.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    to: String,
    #[serde(default, rename = "rememberMe")]
    remember_me: String,
}

/// Query parameters for the OIDC callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// Body of the status route.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub enabled: bool,
    pub label: String,
    pub authenticated: bool,
    pub email: Option<String>,
}

/// Network origin of the caller, for logs.
///
/// Taken from the socket when the server was started with connect info,
/// otherwise from the first `X-Forwarded-For` hop.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(Self(addr.ip().to_string()));
        }
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        Ok(Self(forwarded.unwrap_or("unknown").to_string()))
    }
}

/// Starts a login by redirecting to the identity provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Response {
    let (session_id, mut session) = load_session(&state, &jar).await;

    let auth_url = match flow::begin_login(
        &state.config,
        &state.provider_ctx,
        &mut session,
        &query.to,
        parse_bool_query(&query.remember_me),
    )
    .await
    {
        Ok(url) => url,
        Err(err) => {
            match &err {
                flow::LoginError::Disabled => debug!(ip = %ip, "OIDC login requested while disabled"),
                _ => error!(ip = %ip, error = %err, "OIDC login failed"),
            }
            return err.into_response();
        }
    };

    state
        .sessions
        .save(&session_id, session, state.session_config.login_ttl())
        .await;
    let jar = jar.add(session_cookie(&state.session_config, &session_id, None));
    (jar, found(&auth_url)).into_response()
}

/// Handles the identity provider's redirect back to us.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let (session_id, mut session) = load_session(&state, &jar).await;

    let result = flow::finish_callback(
        &state.config,
        &state.provider_ctx,
        &mut session,
        query.state.as_deref(),
        query.code.as_deref(),
    )
    .await;

    match result {
        Ok(success) => {
            // A login always gets a fresh ID; the pre-login one may have
            // been planted.
            let authenticated_id = SessionId::generate();
            let ttl = state.session_config.session_ttl(success.max_age.is_some());
            state.sessions.remove(&session_id).await;
            state.sessions.save(&authenticated_id, session, ttl).await;
            let max_age = success.max_age.map_or(0, |d| d.whole_seconds());
            info!(ip = %ip, max_age, "OIDC auth success");

            let jar = jar.add(session_cookie(
                &state.session_config,
                &authenticated_id,
                success.max_age,
            ));
            (jar, found(&success.redirect_target)).into_response()
        }
        Err(err) => {
            if matches!(err, flow::CallbackError::Disabled) {
                debug!(ip = %ip, "OIDC callback requested while disabled");
            } else if err.is_unauthorized() {
                warn!(ip = %ip, error = %err, "OIDC callback rejected");
            } else if matches!(err, flow::CallbackError::Provider(_)) {
                error!(ip = %ip, error = %err, "OIDC callback failed");
            }
            err.into_response()
        }
    }
}

/// Forgets the session and expires its cookie.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(session_id) = session_id(&jar, &state.session_config) {
        state.sessions.remove(&session_id).await;
    }

    let remove_session = Cookie::build((state.session_config.cookie_name.clone(), ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    (jar.add(remove_session), found("/")).into_response()
}

/// Reports whether SSO is enabled and whether this browser is logged in.
pub async fn status(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<StatusResponse> {
    let (_, session) = load_session(&state, &jar).await;
    let authenticated = flow::is_session_valid(&state.config, &state.provider_ctx, &session);

    Json(StatusResponse {
        enabled: flow::is_enabled(&state.config),
        label: flow::provider_label(&state.config, &state.provider_ctx),
        authenticated,
        email: authenticated
            .then(|| session.email().to_string())
            .filter(|email| !email.is_empty()),
    })
}

fn session_id(jar: &CookieJar, config: &SessionConfig) -> Option<SessionId> {
    jar.get(&config.cookie_name)
        .map(|cookie| cookie.value().trim())
        .filter(|value| !value.is_empty())
        .map(SessionId::from)
}

/// Loads the caller's session, or starts an empty one under a new ID.
///
/// A cookie naming no stored session is never reused, so clients cannot
/// choose their own session ID.
pub(crate) async fn load_session(state: &AppState, jar: &CookieJar) -> (SessionId, OidcSession) {
    if let Some(id) = session_id(jar, &state.session_config) {
        if let Some(session) = state.sessions.load(&id).await {
            return (id, session);
        }
    }
    (SessionId::generate(), OidcSession::new())
}

/// Builds the session cookie. `None` omits max-age so the cookie lasts
/// for the browser session.
fn session_cookie(
    config: &SessionConfig,
    session_id: &SessionId,
    max_age: Option<TimeDuration>,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax);
    if let Some(max_age) = max_age {
        cookie = cookie.max_age(max_age);
    }
    cookie.build()
}

/// A 302 redirect. `Redirect::to` answers 303.
fn found(location: &str) -> impl IntoResponse {
    (StatusCode::FOUND, [(LOCATION, location.to_string())])
}
