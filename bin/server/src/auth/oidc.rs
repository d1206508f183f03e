//! OIDC client implementation using the openidconnect crate.
//!
//! One engine serves every provider that issues ID tokens. Named providers
//! differ only in how they are configured and in a small normalizer that
//! copies provider-specific claims into [`Claims`].

use async_trait::async_trait;
use base64::Engine;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClaimsVerificationError, ClientId, ClientSecret, CsrfToken, IssuerUrl,
    Nonce, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use serde_json::{Map, Value};
use ssogate_access::{ConfigError, ProviderConfig};
use ssogate_core::{Assurance, Claims, RawClaims, key};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::provider::{
    AuthRedirect, DEFAULT_LABEL, IdentityProvider, ProviderContext, label_or, scopes_or,
};
use crate::error::{ProviderError, ProviderResult};

/// Upper bound on discovery while building an authorization URL.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

const GOOGLE_ISSUER: &str = "https://accounts.google.com";

const MICROSOFT_ISSUER_PREFIX: &str = "https://login.microsoftonline.com/";

/// Copies provider-specific claims after the standard ones are set.
type Normalizer = fn(&RawClaims, &mut Claims);

/// An identity provider reached through OIDC discovery.
#[derive(Debug, Clone)]
pub struct OidcProvider {
    id: &'static str,
    label: String,
    issuer_url: IssuerUrl,
    client_id: ClientId,
    client_secret: Option<ClientSecret>,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
    pkce: bool,
    claim_map: BTreeMap<String, String>,
    normalizer: Normalizer,
    http: reqwest::Client,
}

/// Settings shared by every named constructor.
struct Settings<'a> {
    id: &'static str,
    default_label: &'static str,
    issuer_url: String,
    client_secret: Option<&'a str>,
    redirect_url: String,
    normalizer: Normalizer,
}

impl OidcProvider {
    /// Any discovery-capable OIDC provider.
    ///
    /// Requires `client_id` and `issuer_url`. A blank secret makes this a
    /// public client, which should be paired with `pkce`.
    pub fn custom(config: &ProviderConfig, ctx: &ProviderContext) -> Result<Self, ConfigError> {
        let issuer_url = ProviderConfig::require("custom", "issuer_url", config.issuer_url())?;
        Self::build(
            config,
            ctx,
            Settings {
                id: "custom",
                default_label: DEFAULT_LABEL,
                issuer_url: issuer_url.to_string(),
                client_secret: Some(config.client_secret()).filter(|s| !s.is_empty()),
                redirect_url: ctx.redirect_url(config.redirect_url()),
                normalizer: read_groups,
            },
        )
    }

    /// Google accounts, including Workspace domains.
    pub fn google(config: &ProviderConfig, ctx: &ProviderContext) -> Result<Self, ConfigError> {
        let secret = ProviderConfig::require("google", "client_secret", config.client_secret())?;
        Self::build(
            config,
            ctx,
            Settings {
                id: "google",
                default_label: "Login with Google",
                issuer_url: GOOGLE_ISSUER.to_string(),
                client_secret: Some(secret),
                redirect_url: ctx.redirect_url(config.redirect_url()),
                normalizer: read_hosted_domain,
            },
        )
    }

    /// A single Microsoft Entra ID tenant.
    ///
    /// Multi-tenant endpoints report a per-tenant issuer that differs from
    /// their discovery document, so only single-tenant apps are supported.
    pub fn microsoft(config: &ProviderConfig, ctx: &ProviderContext) -> Result<Self, ConfigError> {
        let secret = ProviderConfig::require("microsoft", "client_secret", config.client_secret())?;
        let tenant = ProviderConfig::require("microsoft", "tenant", config.tenant())?;

        let redirect_url = loopback_as_localhost(ctx.redirect_url(config.redirect_url()));

        Self::build(
            config,
            ctx,
            Settings {
                id: "microsoft",
                default_label: "Login with Microsoft",
                issuer_url: format!("{MICROSOFT_ISSUER_PREFIX}{tenant}/v2.0"),
                client_secret: Some(secret),
                redirect_url,
                normalizer: read_tenant_and_groups,
            },
        )
    }

    /// A Casdoor organization.
    pub fn casdoor(config: &ProviderConfig, ctx: &ProviderContext) -> Result<Self, ConfigError> {
        let secret = ProviderConfig::require("casdoor", "client_secret", config.client_secret())?;
        let issuer_url = ProviderConfig::require("casdoor", "issuer_url", config.issuer_url())?;
        Self::build(
            config,
            ctx,
            Settings {
                id: "casdoor",
                default_label: "Login with Casdoor",
                issuer_url: issuer_url.to_string(),
                client_secret: Some(secret),
                redirect_url: ctx.redirect_url(config.redirect_url()),
                normalizer: read_groups,
            },
        )
    }

    fn build(
        config: &ProviderConfig,
        ctx: &ProviderContext,
        settings: Settings<'_>,
    ) -> Result<Self, ConfigError> {
        let client_id = ProviderConfig::require(settings.id, "client_id", config.client_id())?;
        let issuer_url =
            IssuerUrl::new(settings.issuer_url).map_err(|e| ConfigError::InvalidUrl {
                field: "issuer_url",
                reason: e.to_string(),
            })?;
        if settings.redirect_url.is_empty() {
            return Err(ConfigError::MissingField {
                provider: settings.id.to_string(),
                field: "redirect_url",
            });
        }
        let redirect_url =
            RedirectUrl::new(settings.redirect_url).map_err(|e| ConfigError::InvalidUrl {
                field: "redirect_url",
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: settings.id,
            label: label_or(config.provider_label(), settings.default_label),
            issuer_url,
            client_id: ClientId::new(client_id.to_string()),
            client_secret: settings
                .client_secret
                .map(|s| ClientSecret::new(s.to_string())),
            redirect_url,
            scopes: scopes_or(config, DEFAULT_SCOPES),
            pkce: config.pkce(),
            claim_map: config.claim_map().clone(),
            normalizer: settings.normalizer,
            http: ctx.http.clone(),
        })
    }

    /// Returns the issuer URL used for discovery.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        self.issuer_url.as_str()
    }

    /// Returns the redirect URL sent to the provider.
    #[must_use]
    pub fn redirect_url(&self) -> &str {
        self.redirect_url.as_str()
    }

    /// Returns the scopes requested at login.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    async fn discover(&self) -> ProviderResult<CoreProviderMetadata> {
        let metadata = CoreProviderMetadata::discover_async(self.issuer_url.clone(), &self.http)
            .await
            .map_err(|e| ProviderError::Discovery {
                issuer: self.issuer_url.as_str().to_string(),
                details: e.to_string(),
            })?;
        Ok(metadata)
    }

    fn normalize(
        &self,
        subject: &str,
        issuer: &str,
        audience: Vec<String>,
        payload: Map<String, Value>,
    ) -> Claims {
        let raw = RawClaims::new(payload).with_aliases(self.claim_map.clone());
        let mut claims = Claims::new(self.id, subject, issuer, Assurance::IdToken).with_email(
            raw.string(key::EMAIL, "email"),
            raw.bool(key::EMAIL_VERIFIED, "email_verified"),
        );
        claims.audience = audience;
        claims.preferred_username = raw.string(key::PREFERRED_USERNAME, "preferred_username");
        claims.name = raw.string(key::NAME, "name");
        (self.normalizer)(&raw, &mut claims);
        claims
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    #[instrument(skip_all, fields(provider = %self.id))]
    async fn auth_url(&self, state: &str, nonce: &str) -> ProviderResult<AuthRedirect> {
        let provider_metadata = tokio::time::timeout(DISCOVERY_TIMEOUT, self.discover())
            .await
            .map_err(|_| ProviderError::Timeout {
                operation: "oidc discovery",
            })??;

        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            self.client_id.clone(),
            self.client_secret.clone(),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let state = state.to_string();
        let nonce = nonce.to_string();
        let mut auth_request = client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state),
            move || Nonce::new(nonce),
        );

        // openid is always sent by the client itself
        for scope in self.scopes.iter().filter(|s| *s != "openid") {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let mut pkce_verifier = None;
        if self.pkce {
            let (pkce_challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            auth_request = auth_request.set_pkce_challenge(pkce_challenge);
            pkce_verifier = Some(verifier.secret().clone());
        }

        let (auth_url, _, _) = auth_request.url();
        debug!(pkce = self.pkce, "Built authorization URL");

        Ok(AuthRedirect {
            url: auth_url.to_string(),
            pkce_verifier,
        })
    }

    #[instrument(skip_all, fields(provider = %self.id))]
    async fn handle_callback(
        &self,
        code: &str,
        nonce: Option<&str>,
        pkce_verifier: Option<&str>,
    ) -> ProviderResult<Claims> {
        let pkce_verifier = match pkce_verifier.filter(|v| !v.is_empty()) {
            Some(v) if self.pkce => Some(PkceCodeVerifier::new(v.to_string())),
            None if self.pkce => return Err(ProviderError::MissingPkceVerifier.into()),
            _ => None,
        };

        let provider_metadata = self.discover().await?;
        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            self.client_id.clone(),
            self.client_secret.clone(),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let mut token_request = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| ProviderError::TokenExchange {
                details: format!("token endpoint error: {}", e),
            })?;
        if let Some(verifier) = pkce_verifier {
            token_request = token_request.set_pkce_verifier(verifier);
        }

        let token_response = token_request
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::TokenExchange {
                details: e.to_string(),
            })?;

        let id_token = token_response
            .id_token()
            .ok_or(ProviderError::MissingIdToken)?;

        let verifier = client.id_token_verifier();
        let verified = match nonce {
            Some(expected) => id_token.claims(&verifier, &Nonce::new(expected.to_string())),
            None => id_token.claims(&verifier, |_: Option<&Nonce>| Ok::<(), String>(())),
        }
        .map_err(|e| match e {
            ClaimsVerificationError::InvalidNonce(_) => ProviderError::NonceMismatch,
            other => ProviderError::TokenValidation {
                details: other.to_string(),
            },
        })?;

        let subject = verified.subject().as_str().to_string();
        let issuer = verified.issuer().as_str().to_string();
        let audience = verified
            .audiences()
            .iter()
            .map(|aud| aud.as_str().to_string())
            .collect();

        // Signature is verified above; re-read the payload for non-standard claims.
        let response_json =
            serde_json::to_value(&token_response).map_err(|e| ProviderError::TokenValidation {
                details: format!("failed to serialize token response: {}", e),
            })?;
        let raw_id_token = response_json
            .get("id_token")
            .and_then(Value::as_str)
            .ok_or(ProviderError::MissingIdToken)?;
        let payload = decode_jwt_payload(raw_id_token)?;

        let claims = self.normalize(&subject, &issuer, audience, payload);
        debug!(subject = %claims.subject, "Verified ID token");
        Ok(claims)
    }
}

/// Rewrites an `http://127.0.0.1` redirect to `http://localhost`.
///
/// Entra only accepts plain-http redirects on localhost. Other URLs,
/// including hosts that merely start with `127.0.0.1`, are returned as is.
fn loopback_as_localhost(redirect_url: String) -> String {
    match Url::parse(&redirect_url) {
        Ok(mut url) if url.scheme() == "http" && url.host_str() == Some("127.0.0.1") => {
            match url.set_host(Some("localhost")) {
                Ok(()) => url.to_string(),
                Err(_) => redirect_url,
            }
        }
        _ => redirect_url,
    }
}

/// Decodes the payload segment of a compact JWT without verifying it.
fn decode_jwt_payload(token: &str) -> ProviderResult<Map<String, Value>> {
    let invalid = |details: String| ProviderError::TokenValidation { details };

    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid("invalid JWT format".to_string()).into());
    };

    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| invalid(format!("failed to decode JWT payload: {}", e)))?;

    match serde_json::from_slice::<Value>(&payload_bytes)
        .map_err(|e| invalid(format!("failed to parse JWT payload: {}", e)))?
    {
        Value::Object(map) => Ok(map),
        _ => Err(invalid("JWT payload is not an object".to_string()).into()),
    }
}

fn read_groups(raw: &RawClaims, claims: &mut Claims) {
    claims.groups = raw.string_list(key::GROUPS, "groups");
}

fn read_hosted_domain(raw: &RawClaims, claims: &mut Claims) {
    claims.hosted_domain = raw.string(key::HOSTED_DOMAIN, "hd");
}

fn read_tenant_and_groups(raw: &RawClaims, claims: &mut Claims) {
    claims.tenant_id = raw.string(key::TENANT_ID, "tid");
    read_groups(raw, claims);
}
