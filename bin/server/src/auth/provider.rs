//! Identity provider abstraction and registry.
//!
//! Every supported provider is one variant of [`Provider`] and one row in
//! the static factory table. Constructing a provider never touches the
//! network; required fields are validated up front so a misconfigured
//! provider fails here rather than halfway through a login.

use async_trait::async_trait;
use ssogate_access::{ConfigError, OidcConfig, ProviderConfig};
use ssogate_core::Claims;
use url::Url;

use super::github::GitHubProvider;
use super::oidc::OidcProvider;
use crate::config::Container;
use crate::error::{ProviderError, ProviderResult};

/// Path the server serves the login callback on.
pub const CALLBACK_PATH: &str = "/auth/oidc/callback";

/// Redirect URL used by mobile and embedded shells.
pub const MOBILE_REDIRECT_URL: &str = "ssogate://oidc-callback";

/// Label shown when a provider has none configured.
pub const DEFAULT_LABEL: &str = "Login with SSO";

/// Where to send the browser to start a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRedirect {
    /// Authorization endpoint URL with all query parameters.
    pub url: String,
    /// PKCE verifier the caller must keep until the callback.
    pub pkce_verifier: Option<String>,
}

/// The capability every identity provider offers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stable provider key matching configuration.
    fn id(&self) -> &str;

    /// Login button text.
    fn label(&self) -> &str;

    /// Builds the authorization URL for a new login.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be discovered in time.
    async fn auth_url(&self, state: &str, nonce: &str) -> ProviderResult<AuthRedirect>;

    /// Exchanges an authorization code for verified, normalized claims.
    ///
    /// `nonce` is checked against the ID token when present. `pkce_verifier`
    /// is the value returned from [`auth_url`](Self::auth_url).
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange, verification or profile lookup fails.
    async fn handle_callback(
        &self,
        code: &str,
        nonce: Option<&str>,
        pkce_verifier: Option<&str>,
    ) -> ProviderResult<Claims>;
}

/// Deployment facts a provider needs at construction.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub container: Container,
    pub public_port: u16,
    pub http: reqwest::Client,
}

impl ProviderContext {
    /// Creates a context with an HTTP client that never follows redirects.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(container: Container, public_port: u16) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("ssogate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Configuration {
                details: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            container,
            public_port,
            http,
        })
    }

    /// Returns the redirect URL used when none is configured.
    #[must_use]
    pub fn default_redirect_url(&self) -> String {
        match self.container {
            Container::Mobile => MOBILE_REDIRECT_URL.to_string(),
            Container::Desktop | Container::Server => {
                format!("http://127.0.0.1:{}{}", self.public_port, CALLBACK_PATH)
            }
        }
    }

    /// Normalizes a configured redirect URL.
    ///
    /// Blank selects the default. An http(s) URL with no path gets the
    /// callback path appended. Anything else is used verbatim.
    #[must_use]
    pub fn redirect_url(&self, configured: &str) -> String {
        let configured = configured.trim();
        if configured.is_empty() {
            return self.default_redirect_url();
        }

        let parsed = Url::parse(configured).or_else(|e| {
            if configured.starts_with("http") {
                Err(e)
            } else {
                Url::parse(&format!("http://{configured}"))
            }
        });
        match parsed {
            Ok(mut url) if matches!(url.scheme(), "http" | "https") && url.path() == "/" => {
                url.set_path(CALLBACK_PATH);
                url.to_string()
            }
            _ => configured.to_string(),
        }
    }
}

/// A constructed identity provider.
#[derive(Debug, Clone)]
pub enum Provider {
    /// Providers that issue verified ID tokens.
    Oidc(OidcProvider),
    /// OAuth2-only provider reading identity from a REST profile.
    GitHub(GitHubProvider),
}

impl Provider {
    fn inner(&self) -> &dyn IdentityProvider {
        match self {
            Self::Oidc(p) => p,
            Self::GitHub(p) => p,
        }
    }
}

#[async_trait]
impl IdentityProvider for Provider {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn label(&self) -> &str {
        self.inner().label()
    }

    async fn auth_url(&self, state: &str, nonce: &str) -> ProviderResult<AuthRedirect> {
        self.inner().auth_url(state, nonce).await
    }

    async fn handle_callback(
        &self,
        code: &str,
        nonce: Option<&str>,
        pkce_verifier: Option<&str>,
    ) -> ProviderResult<Claims> {
        self.inner()
            .handle_callback(code, nonce, pkce_verifier)
            .await
    }
}

type ProviderCtor = fn(&ProviderConfig, &ProviderContext) -> Result<Provider, ConfigError>;

/// Provider name to constructor. Read-only for the life of the process.
static PROVIDERS: [(&str, ProviderCtor); 5] = [
    ("custom", |c, ctx| OidcProvider::custom(c, ctx).map(Provider::Oidc)),
    ("google", |c, ctx| OidcProvider::google(c, ctx).map(Provider::Oidc)),
    ("microsoft", |c, ctx| OidcProvider::microsoft(c, ctx).map(Provider::Oidc)),
    ("casdoor", |c, ctx| OidcProvider::casdoor(c, ctx).map(Provider::Oidc)),
    ("github", |c, ctx| GitHubProvider::new(c, ctx).map(Provider::GitHub)),
];

/// Returns the names of all supported providers.
pub fn supported_providers() -> impl Iterator<Item = &'static str> {
    PROVIDERS.iter().map(|(name, _)| *name)
}

/// Builds a provider by name from its configuration.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedProvider`] for unknown names, or the
/// provider's own validation error.
pub fn new_provider(
    name: &str,
    config: &ProviderConfig,
    ctx: &ProviderContext,
) -> Result<Provider, ConfigError> {
    let ctor = PROVIDERS
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, ctor)| *ctor)
        .ok_or_else(|| ConfigError::UnsupportedProvider {
            name: name.to_string(),
        })?;
    ctor(config, ctx)
}

/// Builds the active provider of a login configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if no provider is configured, the name is
/// unknown, or a required field is blank.
pub fn active_provider(config: &OidcConfig, ctx: &ProviderContext) -> Result<Provider, ConfigError> {
    let provider_config = config.active_provider_config()?;
    new_provider(config.active_provider(), provider_config, ctx)
}

/// Returns `configured` if non-blank, else `fallback`.
pub(crate) fn label_or(configured: &str, fallback: &str) -> String {
    if configured.is_empty() {
        fallback.to_string()
    } else {
        configured.to_string()
    }
}

/// Returns the configured scopes, or `defaults` if none are set.
pub(crate) fn scopes_or(config: &ProviderConfig, defaults: &[&str]) -> Vec<String> {
    if config.scopes().is_empty() {
        defaults.iter().map(|s| (*s).to_string()).collect()
    } else {
        config.scopes().to_vec()
    }
}
