//! Canonical identity claims.
//!
//! Every provider adapter, whether it verifies a signed ID token or reads a
//! REST profile, normalizes what it learned into a [`Claims`] value. Access
//! filters only ever see this shape, keyed by the constants in [`key`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Claim keys understood by access filters and claim remapping.
pub mod key {
    pub const PROVIDER: &str = "provider";
    pub const SUBJECT: &str = "subject";
    pub const EMAIL: &str = "email";
    pub const EMAIL_VERIFIED: &str = "email_verified";
    pub const PREFERRED_USERNAME: &str = "preferred_username";
    pub const NAME: &str = "name";
    pub const ISSUER: &str = "issuer";
    pub const AUDIENCE: &str = "audience";
    pub const HOSTED_DOMAIN: &str = "hosted_domain";
    pub const TENANT_ID: &str = "tenant_id";
    pub const GROUPS: &str = "groups";
    pub const ASSURANCE: &str = "assurance";

    /// Keys whose source field may be remapped per provider.
    ///
    /// Subject, issuer and audience always come from the verified token.
    pub const REMAPPABLE: &[&str] = &[
        EMAIL,
        EMAIL_VERIFIED,
        PREFERRED_USERNAME,
        NAME,
        HOSTED_DOMAIN,
        TENANT_ID,
        GROUPS,
    ];
}

/// How strongly the identity behind a set of claims was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assurance {
    /// Claims come from an ID token whose signature, issuer, audience and
    /// nonce were verified against the provider's published keys.
    #[serde(rename = "id_token")]
    IdToken,
    /// Claims come from REST profile calls made with an OAuth2 access token.
    /// Nothing in the response is signed; the only guarantee is that the
    /// provider answered the request over TLS.
    #[serde(rename = "oauth_profile")]
    OAuthProfile,
}

impl Assurance {
    /// Returns the filter value for this assurance level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IdToken => "id_token",
            Self::OAuthProfile => "oauth_profile",
        }
    }
}

impl fmt::Display for Assurance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical identity record produced by a successful callback.
///
/// Claims are consumed immediately by the access filter and then dropped;
/// only `subject` and `email` are copied into the browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub provider: String,
    pub subject: String,
    pub email: String,
    pub email_verified: Option<bool>,
    pub preferred_username: String,
    pub name: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub hosted_domain: String,
    pub tenant_id: String,
    pub groups: Vec<String>,
    pub assurance: Assurance,
}

impl Claims {
    /// Creates claims for a subject with every optional field empty.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        subject: impl Into<String>,
        issuer: impl Into<String>,
        assurance: Assurance,
    ) -> Self {
        Self {
            provider: provider.into(),
            subject: subject.into(),
            email: String::new(),
            email_verified: None,
            preferred_username: String::new(),
            name: String::new(),
            issuer: issuer.into(),
            audience: Vec::new(),
            hosted_domain: String::new(),
            tenant_id: String::new(),
            groups: Vec::new(),
            assurance,
        }
    }

    /// Sets the email and its verification flag.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>, verified: Option<bool>) -> Self {
        self.email = email.into();
        self.email_verified = verified;
        self
    }

    /// Sets the group memberships.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Returns every non-empty claim value keyed by its filter key.
    ///
    /// Multi-valued claims (audience, groups) contribute one entry per value.
    #[must_use]
    pub fn filter_values(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut values = BTreeMap::new();
        add_value(&mut values, key::PROVIDER, &self.provider);
        add_value(&mut values, key::SUBJECT, &self.subject);
        add_value(&mut values, key::EMAIL, &self.email);
        add_value(&mut values, key::PREFERRED_USERNAME, &self.preferred_username);
        add_value(&mut values, key::NAME, &self.name);
        add_value(&mut values, key::ISSUER, &self.issuer);
        if let Some(verified) = self.email_verified {
            add_value(&mut values, key::EMAIL_VERIFIED, &verified.to_string());
        }
        for aud in &self.audience {
            add_value(&mut values, key::AUDIENCE, aud);
        }
        add_value(&mut values, key::HOSTED_DOMAIN, &self.hosted_domain);
        add_value(&mut values, key::TENANT_ID, &self.tenant_id);
        for group in &self.groups {
            add_value(&mut values, key::GROUPS, group);
        }
        add_value(&mut values, key::ASSURANCE, self.assurance.as_str());
        values
    }
}

fn add_value(values: &mut BTreeMap<&'static str, Vec<String>>, key: &'static str, value: &str) {
    if value.is_empty() {
        return;
    }
    values.entry(key).or_default().push(value.to_string());
}

/// Untyped claims decoded from a verified ID token or a profile response.
///
/// Lookups go through an optional alias table so a deployment can read,
/// say, the `email` claim from a provider-specific `mail` field.
#[derive(Debug, Clone, Default)]
pub struct RawClaims {
    fields: Map<String, Value>,
    aliases: BTreeMap<String, String>,
}

impl RawClaims {
    /// Wraps a decoded JSON object.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            aliases: BTreeMap::new(),
        }
    }

    /// Installs a canonical-key to raw-field alias table.
    ///
    /// Aliases for keys outside [`key::REMAPPABLE`] are ignored.
    #[must_use]
    pub fn with_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.aliases = aliases
            .into_iter()
            .filter(|(canonical, field)| {
                key::REMAPPABLE.contains(&canonical.as_str()) && !field.trim().is_empty()
            })
            .map(|(canonical, field)| (canonical, field.trim().to_string()))
            .collect();
        self
    }

    fn field<'a>(&'a self, canonical: &str, default_field: &'a str) -> Option<&'a Value> {
        let name = self
            .aliases
            .get(canonical)
            .map_or(default_field, String::as_str);
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Reads a string claim, returning an empty string when absent or not a string.
    #[must_use]
    pub fn string(&self, canonical: &str, default_field: &str) -> String {
        match self.field(canonical, default_field) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Reads a list claim. A bare string is treated as a one-element list.
    #[must_use]
    pub fn string_list(&self, canonical: &str, default_field: &str) -> Vec<String> {
        match self.field(canonical, default_field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Reads a boolean claim.
    #[must_use]
    pub fn bool(&self, canonical: &str, default_field: &str) -> Option<bool> {
        self.field(canonical, default_field).and_then(Value::as_bool)
    }
}
