//! GitHub OAuth2 login.
//!
//! GitHub implements neither discovery nor ID tokens, so identity comes
//! from REST calls made with the access token:
//! - `GET {api}/user` for the account id, login and public profile
//! - `GET {api}/user/emails` for the primary address, even when private
//!
//! Nothing in these responses is signed. Claims from this adapter carry
//! [`Assurance::OAuthProfile`] and must not be treated as equivalent to a
//! verified ID token; filters can require `assurance: exact:id_token` to
//! exclude them.

use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EmptyExtraTokenFields,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, StandardTokenResponse, TokenResponse,
    TokenUrl,
    basic::{BasicClient, BasicTokenType},
};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use ssogate_access::{ConfigError, ProviderConfig};
use ssogate_core::{Assurance, Claims};
use tracing::{debug, instrument, warn};

use super::provider::{AuthRedirect, IdentityProvider, ProviderContext, label_or, scopes_or};
use crate::error::{ProviderError, ProviderResult};

/// Public GitHub web base. Also reported as the issuer.
const GITHUB_WEB_BASE: &str = "https://github.com";

/// Public GitHub REST API base.
const GITHUB_API_BASE: &str = "https://api.github.com";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

const DEFAULT_SCOPES: &[&str] = &["read:user", "user:email"];

type GitHubTokenResponse = StandardTokenResponse<EmptyExtraTokenFields, BasicTokenType>;

/// GitHub or GitHub Enterprise Server login.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    label: String,
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    api_base: String,
    issuer: String,
    scopes: Vec<String>,
    pkce: bool,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EmailEntry {
    #[serde(default)]
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

impl GitHubProvider {
    /// Creates a GitHub provider.
    ///
    /// A non-blank `issuer_url` selects a GitHub Enterprise Server at that
    /// base URL instead of github.com.
    ///
    /// # Errors
    ///
    /// Returns an error if the client ID or secret is blank, or a derived
    /// URL is invalid.
    pub fn new(config: &ProviderConfig, ctx: &ProviderContext) -> Result<Self, ConfigError> {
        let client_id = ProviderConfig::require("github", "client_id", config.client_id())?;
        let client_secret =
            ProviderConfig::require("github", "client_secret", config.client_secret())?;

        let (web_base, api_base) = match config.issuer_url().trim_end_matches('/') {
            "" => (GITHUB_WEB_BASE.to_string(), GITHUB_API_BASE.to_string()),
            base => (base.to_string(), format!("{base}/api/v3")),
        };

        let invalid = |field: &'static str| {
            move |e: oauth2::url::ParseError| ConfigError::InvalidUrl {
                field,
                reason: e.to_string(),
            }
        };
        let auth_url =
            AuthUrl::new(format!("{web_base}/login/oauth/authorize")).map_err(invalid("issuer_url"))?;
        let token_url = TokenUrl::new(format!("{web_base}/login/oauth/access_token"))
            .map_err(invalid("issuer_url"))?;
        let redirect_url = RedirectUrl::new(ctx.redirect_url(config.redirect_url()))
            .map_err(invalid("redirect_url"))?;

        Ok(Self {
            label: label_or(config.provider_label(), "Login with GitHub"),
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
            auth_url,
            token_url,
            redirect_url,
            api_base,
            issuer: web_base,
            scopes: scopes_or(config, DEFAULT_SCOPES),
            pkce: config.pkce(),
            http: ctx.http.clone(),
        })
    }

    /// Returns the REST API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        access_token: &str,
    ) -> ProviderResult<T> {
        let lookup_failed = |details: String| ProviderError::ProfileLookup { resource, details };

        let response = self
            .http
            .get(format!("{}{}", self.api_base, resource))
            .bearer_auth(access_token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(lookup_failed(format!("GitHub API returned {}", status)).into());
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;
        Ok(body)
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn id(&self) -> &str {
        "github"
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn auth_url(&self, state: &str, _nonce: &str) -> ProviderResult<AuthRedirect> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let state = state.to_string();
        let mut auth_request = client.authorize_url(move || CsrfToken::new(state));
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let mut pkce_verifier = None;
        if self.pkce {
            let (pkce_challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            auth_request = auth_request.set_pkce_challenge(pkce_challenge);
            pkce_verifier = Some(verifier.secret().clone());
        }

        let (auth_url, _) = auth_request.url();
        Ok(AuthRedirect {
            url: auth_url.to_string(),
            pkce_verifier,
        })
    }

    #[instrument(skip_all, fields(provider = "github"))]
    async fn handle_callback(
        &self,
        code: &str,
        _nonce: Option<&str>,
        pkce_verifier: Option<&str>,
    ) -> ProviderResult<Claims> {
        let pkce_verifier = match pkce_verifier.filter(|v| !v.is_empty()) {
            Some(v) if self.pkce => Some(PkceCodeVerifier::new(v.to_string())),
            None if self.pkce => return Err(ProviderError::MissingPkceVerifier.into()),
            _ => None,
        };

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let mut token_request = client.exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = pkce_verifier {
            token_request = token_request.set_pkce_verifier(verifier);
        }
        let token_result: GitHubTokenResponse = token_request
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::TokenExchange {
                details: e.to_string(),
            })?;
        let access_token = token_result.access_token().secret();

        let user: Map<String, Value> = self.fetch_json("/user", access_token).await?;
        let subject = match user.get("id") {
            Some(Value::Number(id)) => id.to_string(),
            Some(Value::String(id)) => id.clone(),
            _ => String::new(),
        };

        let mut claims = Claims::new("github", subject, self.issuer.as_str(), Assurance::OAuthProfile)
            .with_email(string_field(&user, "email"), None);
        claims.preferred_username = string_field(&user, "login");
        claims.name = string_field(&user, "name");

        // /user only shows the public email; the list includes private ones.
        match self
            .fetch_json::<Vec<EmailEntry>>("/user/emails", access_token)
            .await
        {
            Ok(entries) => {
                if let Some(entry) = pick_email(&entries) {
                    claims.email = entry.email.clone();
                    claims.email_verified = Some(entry.verified);
                }
            }
            Err(report) => warn!(error = %report, "Failed to fetch GitHub email list"),
        }

        debug!(subject = %claims.subject, "Fetched GitHub profile");
        Ok(claims)
    }
}

fn string_field(map: &Map<String, Value>, field: &str) -> String {
    map.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Primary and verified first, then primary, then any address.
fn pick_email(entries: &[EmailEntry]) -> Option<&EmailEntry> {
    let usable = || entries.iter().filter(|e| !e.email.is_empty());
    usable()
        .find(|e| e.primary && e.verified)
        .or_else(|| usable().find(|e| e.primary))
        .or_else(|| usable().next())
}
