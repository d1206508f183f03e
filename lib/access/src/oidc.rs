//! OIDC (OpenID Connect) provider configuration.
//!
//! This module provides configuration types describing which external
//! identity provider handles login, how to reach it, and which claims
//! are allowed through.

use crate::error::ConfigError;
use crate::filter::FilterConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Static configuration for a single identity provider.
///
/// Immutable after load. Field names are snake_case; the camelCase spellings
/// (`clientID`, `issuerURL`, ...) are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The OAuth2 client ID registered with the provider.
    #[serde(default, alias = "clientID", alias = "clientId")]
    client_id: String,
    /// The OAuth2 client secret. Empty for public clients.
    #[serde(default, alias = "clientSecret")]
    client_secret: String,
    /// The issuer URL used for discovery.
    #[serde(default, alias = "issuerURL", alias = "issuerUrl")]
    issuer_url: String,
    /// Callback URL registered with the provider. Empty selects a default.
    #[serde(default, alias = "redirectURL", alias = "redirectUrl")]
    redirect_url: String,
    /// Scopes to request. Empty selects the provider's defaults.
    ///
    /// Accepts a list or a single string separated by commas or whitespace.
    #[serde(default, deserialize_with = "deserialize_scopes")]
    scopes: Vec<String>,
    /// Directory tenant, for providers that need one.
    #[serde(default)]
    tenant: String,
    /// Whether to send a PKCE challenge.
    #[serde(default)]
    pkce: bool,
    /// Login button text.
    #[serde(default, alias = "providerLabel")]
    provider_label: String,
    /// Canonical claim key to raw ID-token field.
    #[serde(default, alias = "claimMap")]
    claim_map: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopesRepr {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let scopes = match ScopesRepr::deserialize(deserializer)? {
        ScopesRepr::List(list) => list,
        ScopesRepr::Joined(joined) => joined
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
    };
    Ok(normalize_scopes(scopes))
}

fn normalize_scopes(scopes: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(scopes.len());
    for scope in scopes {
        let scope = scope.trim();
        if !scope.is_empty() && !out.iter().any(|s| s == scope) {
            out.push(scope.to_string());
        }
    }
    out
}

impl ProviderConfig {
    /// Creates a provider configuration with the given client ID.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = secret.into();
        self
    }

    /// Sets the issuer URL.
    #[must_use]
    pub fn with_issuer_url(mut self, url: impl Into<String>) -> Self {
        self.issuer_url = url.into();
        self
    }

    /// Sets the redirect URL.
    #[must_use]
    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = url.into();
        self
    }

    /// Replaces the requested scopes. Blank and duplicate entries are dropped.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = normalize_scopes(scopes);
        self
    }

    /// Sets the directory tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Enables or disables PKCE.
    #[must_use]
    pub fn with_pkce(mut self, pkce: bool) -> Self {
        self.pkce = pkce;
        self
    }

    /// Sets the login button text.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.provider_label = label.into();
        self
    }

    /// Reads a canonical claim from a different raw field.
    #[must_use]
    pub fn with_claim(mut self, canonical: impl Into<String>, field: impl Into<String>) -> Self {
        self.claim_map.insert(canonical.into(), field.into());
        self
    }

    /// Returns the client ID, trimmed.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.trim()
    }

    /// Returns the client secret, trimmed.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.trim()
    }

    /// Returns the issuer URL, trimmed.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        self.issuer_url.trim()
    }

    /// Returns the configured redirect URL, trimmed. May be empty.
    #[must_use]
    pub fn redirect_url(&self) -> &str {
        self.redirect_url.trim()
    }

    /// Returns the configured scopes. May be empty.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns the tenant, trimmed.
    #[must_use]
    pub fn tenant(&self) -> &str {
        self.tenant.trim()
    }

    /// Returns true if PKCE is enabled.
    #[must_use]
    pub fn pkce(&self) -> bool {
        self.pkce
    }

    /// Returns the configured label, trimmed. May be empty.
    #[must_use]
    pub fn provider_label(&self) -> &str {
        self.provider_label.trim()
    }

    /// Returns the claim remapping table.
    #[must_use]
    pub fn claim_map(&self) -> &BTreeMap<String, String> {
        &self.claim_map
    }

    /// Fails with [`ConfigError::MissingField`] if `value` is blank.
    ///
    /// # Errors
    ///
    /// Returns an error naming `provider` and `field` when `value` is blank.
    pub fn require<'a>(
        provider: &str,
        field: &'static str,
        value: &'a str,
    ) -> Result<&'a str, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::MissingField {
                provider: provider.to_string(),
                field,
            });
        }
        Ok(value)
    }
}

/// Top-level federated login configuration.
///
/// SSO is enabled when `provider` names an entry in `providers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Name of the active provider. Empty disables SSO.
    #[serde(default)]
    provider: String,
    /// Configuration per provider name.
    #[serde(default)]
    providers: BTreeMap<String, ProviderConfig>,
    /// Claim filters applied after every successful callback.
    #[serde(default, alias = "filter")]
    filters: FilterConfig,
}

impl OidcConfig {
    /// Creates a disabled configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(provider: impl Into<String>) -> OidcConfigBuilder {
        OidcConfigBuilder::new(provider)
    }

    /// Returns the active provider name, trimmed.
    #[must_use]
    pub fn active_provider(&self) -> &str {
        self.provider.trim()
    }

    /// Returns true if a provider is selected and configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        let name = self.active_provider();
        !name.is_empty() && self.providers.contains_key(name)
    }

    /// Returns the active provider's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ProviderNotConfigured`] if no provider is
    /// selected or the selected one has no configuration block.
    pub fn active_provider_config(&self) -> Result<&ProviderConfig, ConfigError> {
        let name = self.active_provider();
        self.providers
            .get(name)
            .ok_or_else(|| ConfigError::ProviderNotConfigured {
                name: name.to_string(),
            })
    }

    /// Returns the configuration for a named provider.
    #[must_use]
    pub fn provider_config(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Returns the claim filters.
    #[must_use]
    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }
}

/// Builder for `OidcConfig`.
#[derive(Debug)]
pub struct OidcConfigBuilder {
    provider: String,
    providers: BTreeMap<String, ProviderConfig>,
    filters: FilterConfig,
}

impl OidcConfigBuilder {
    /// Creates a builder with the given active provider name.
    #[must_use]
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            providers: BTreeMap::new(),
            filters: FilterConfig::new(),
        }
    }

    /// Adds or replaces a provider configuration.
    #[must_use]
    pub fn provider(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.providers.insert(name.into(), config);
        self
    }

    /// Sets the claim filters.
    #[must_use]
    pub fn filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }

    /// Builds the `OidcConfig`.
    #[must_use]
    pub fn build(self) -> OidcConfig {
        OidcConfig {
            provider: self.provider,
            providers: self.providers,
            filters: self.filters,
        }
    }
}
