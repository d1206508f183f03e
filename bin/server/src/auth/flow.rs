//! Login and callback orchestration.
//!
//! These functions hold the protocol logic and nothing HTTP-specific: the
//! caller loads the [`OidcSession`], passes it in, and persists it
//! afterwards. Routes in [`super::routes`] wrap them with cookies, query
//! parsing and logging.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use openidconnect::{CsrfToken, Nonce};
use rootcause::prelude::Report;
use ssogate_access::{
    AuthenticationError, Challenge, ConfigError, OidcConfig, OidcSession, sanitize_redirect_path,
};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::provider::{DEFAULT_LABEL, IdentityProvider, ProviderContext, active_provider};
use crate::error::ProviderError;

/// Upper bound on the provider round trips made during a callback.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Cookie lifetime when the user asked to be remembered.
pub const REMEMBER_ME_MAX_AGE: time::Duration = time::Duration::days(30);

/// Body sent with every 401. The reason is only logged.
const UNAUTHORIZED_BODY: &str = "Authentication failed";

/// Why a login could not be started.
#[derive(Debug)]
pub enum LoginError {
    /// SSO is not configured.
    Disabled,
    /// The active provider could not be built.
    Provider(ConfigError),
    /// The provider could not produce an authorization URL.
    AuthUrl(Report<ProviderError>),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "oidc is disabled"),
            Self::Provider(err) => write!(f, "init oidc provider failed: {}", err),
            Self::AuthUrl(report) => write!(f, "building authorization url failed: {}", report),
        }
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            Self::Disabled => StatusCode::NOT_FOUND.into_response(),
            Self::Provider(_) | Self::AuthUrl(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Why a callback was refused.
#[derive(Debug)]
pub enum CallbackError {
    /// SSO is not configured.
    Disabled,
    /// The active provider could not be built.
    Provider(ConfigError),
    /// The session or the returned claims failed a protocol check.
    Rejected(AuthenticationError),
    /// Code exchange, token verification or profile lookup failed.
    ProviderFailed(Report<ProviderError>),
}

impl CallbackError {
    /// Returns true for failures that are the caller's fault rather than ours.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::ProviderFailed(_))
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "oidc is disabled"),
            Self::Provider(err) => write!(f, "init oidc provider failed: {}", err),
            Self::Rejected(err) => write!(f, "{}", err),
            Self::ProviderFailed(report) => write!(f, "oidc callback failed: {}", report),
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        match self {
            Self::Disabled => StatusCode::NOT_FOUND.into_response(),
            Self::Provider(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            Self::Rejected(_) | Self::ProviderFailed(_) => {
                (StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY).into_response()
            }
        }
    }
}

/// Outcome of a successful callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    /// Sanitized path to send the browser to.
    pub redirect_target: String,
    /// Cookie lifetime. `None` keeps the cookie for the browser session only.
    pub max_age: Option<time::Duration>,
}

/// Returns true if a provider is named and has a configuration block.
#[must_use]
pub fn is_enabled(config: &OidcConfig) -> bool {
    config.is_enabled()
}

/// Returns the login button text for the active provider.
#[must_use]
pub fn provider_label(config: &OidcConfig, ctx: &ProviderContext) -> String {
    if !is_enabled(config) {
        return DEFAULT_LABEL.to_string();
    }
    match active_provider(config, ctx) {
        Ok(provider) => provider.label().to_string(),
        Err(_) => DEFAULT_LABEL.to_string(),
    }
}

/// Returns true if `session` holds an identity from the active provider.
#[must_use]
pub fn is_session_valid(config: &OidcConfig, ctx: &ProviderContext, session: &OidcSession) -> bool {
    if !is_enabled(config) {
        return false;
    }
    match active_provider(config, ctx) {
        Ok(provider) => session.is_authenticated_for(provider.id()),
        Err(_) => false,
    }
}

/// Starts a login and returns the authorization URL to redirect to.
///
/// On success the session is challenged with fresh state and nonce values
/// and the sanitized return path. On failure it is left unchanged.
///
/// # Errors
///
/// Returns [`LoginError`] if SSO is disabled, the provider cannot be built,
/// or the authorization URL cannot be produced.
pub async fn begin_login(
    config: &OidcConfig,
    ctx: &ProviderContext,
    session: &mut OidcSession,
    to: &str,
    remember_me: bool,
) -> Result<String, LoginError> {
    if !is_enabled(config) {
        return Err(LoginError::Disabled);
    }
    let provider = active_provider(config, ctx).map_err(LoginError::Provider)?;

    let state = CsrfToken::new_random().secret().clone();
    let nonce = Nonce::new_random().secret().clone();
    let redirect = provider
        .auth_url(&state, &nonce)
        .await
        .map_err(LoginError::AuthUrl)?;

    session.challenge(Challenge {
        provider: provider.id().to_string(),
        state,
        nonce,
        redirect_target: sanitize_redirect_path(to),
        remember_me,
        pkce_verifier: redirect.pkce_verifier,
    });
    debug!(provider = provider.id(), "Started OIDC login");

    Ok(redirect.url)
}

/// Completes a login from the provider's callback parameters.
///
/// Checks run in order: pending challenge, state, code, provider, then the
/// provider exchange, subject and claim filter. Any failure leaves the
/// session unchanged.
///
/// # Errors
///
/// Returns [`CallbackError`]; see its variants for the status each maps to.
pub async fn finish_callback(
    config: &OidcConfig,
    ctx: &ProviderContext,
    session: &mut OidcSession,
    state: Option<&str>,
    code: Option<&str>,
) -> Result<LoginSuccess, CallbackError> {
    if !is_enabled(config) {
        return Err(CallbackError::Disabled);
    }

    let pending = session
        .verify_callback(state, code, config.active_provider())
        .map_err(CallbackError::Rejected)?;
    let provider = active_provider(config, ctx).map_err(CallbackError::Provider)?;

    let claims = tokio::time::timeout(
        CALLBACK_TIMEOUT,
        provider.handle_callback(
            &pending.code,
            pending.nonce.as_deref(),
            pending.pkce_verifier.as_deref(),
        ),
    )
    .await
    .map_err(|_| {
        CallbackError::ProviderFailed(
            ProviderError::Timeout {
                operation: "oidc callback",
            }
            .into(),
        )
    })?
    .map_err(CallbackError::ProviderFailed)?;

    if claims.subject.is_empty() {
        return Err(CallbackError::Rejected(AuthenticationError::MissingSubject));
    }
    if !config.filters().is_allowed(&claims) {
        return Err(CallbackError::Rejected(AuthenticationError::FilterRejected {
            subject: claims.subject,
        }));
    }

    let completion = session.complete(claims.subject, claims.email);
    Ok(LoginSuccess {
        redirect_target: sanitize_redirect_path(&completion.redirect_target),
        max_age: completion.remember_me.then_some(REMEMBER_ME_MAX_AGE),
    })
}
