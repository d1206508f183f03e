//! Claim filters.
//!
//! A filter maps claim keys to pattern lists. A claim set passes when,
//! for every configured key, at least one pattern matches at least one
//! observed value for that key.

use crate::matcher::Matcher;
use serde::{Deserialize, Serialize};
use ssogate_core::Claims;
use std::collections::BTreeMap;
use tracing::warn;

/// Allow-rules keyed by claim key.
///
/// An empty filter allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterConfig(BTreeMap<String, Vec<String>>);

impl FilterConfig {
    /// Creates an empty, allow-all filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the pattern list for a claim key.
    #[must_use]
    pub fn with_rule(mut self, key: impl Into<String>, patterns: Vec<String>) -> Self {
        self.0.insert(key.into(), patterns);
        self
    }

    /// Returns true if no rules are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluates the filter against a claim set.
    ///
    /// A configured key with no observed values denies, as does a key whose
    /// pattern list is empty. Invalid patterns are logged and never match.
    #[must_use]
    pub fn is_allowed(&self, claims: &Claims) -> bool {
        if self.0.is_empty() {
            return true;
        }

        let observed = claims.filter_values();
        self.0.iter().all(|(key, patterns)| {
            let Some(values) = observed.get(key.trim()) else {
                return false;
            };
            patterns
                .iter()
                .filter_map(|pattern| compile(key, pattern))
                .any(|matcher| values.iter().any(|value| matcher.is_match(value)))
        })
    }
}

fn compile(key: &str, pattern: &str) -> Option<Matcher> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return None;
    }
    match Matcher::parse(pattern) {
        Ok(matcher) => Some(matcher),
        Err(e) => {
            warn!(claim = %key, pattern = %pattern, error = %e, "Invalid OIDC filter pattern");
            None
        }
    }
}

impl From<BTreeMap<String, Vec<String>>> for FilterConfig {
    fn from(rules: BTreeMap<String, Vec<String>>) -> Self {
        Self(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssogate_core::Assurance;

    fn alice() -> Claims {
        Claims::new(
            "custom",
            "sub-alice",
            "https://idp.example.com",
            Assurance::IdToken,
        )
        .with_email("alice@example.com", Some(true))
        .with_groups(vec!["Staff".to_string(), "Admins".to_string()])
    }

    #[test]
    fn empty_filter_allows_everything() {
        assert!(FilterConfig::new().is_allowed(&alice()));
    }

    #[test]
    fn empty_pattern_list_denies() {
        let filters = FilterConfig::new().with_rule("email", vec![]);
        assert!(!filters.is_allowed(&alice()));
    }

    #[test]
    fn absent_claim_denies() {
        let filters = FilterConfig::new().with_rule("hosted_domain", vec![".*".to_string()]);
        assert!(!filters.is_allowed(&alice()));
    }

    #[test]
    fn patterns_under_one_key_are_or() {
        let filters = FilterConfig::new().with_rule(
            "email",
            vec!["@corp\\.example$".to_string(), "@example\\.com$".to_string()],
        );
        assert!(filters.is_allowed(&alice()));
    }

    #[test]
    fn keys_are_and() {
        let passing = FilterConfig::new()
            .with_rule("email", vec!["@example\\.com$".to_string()])
            .with_rule("groups", vec!["str:admins".to_string()]);
        assert!(passing.is_allowed(&alice()));

        let failing = passing.with_rule("groups", vec!["exact:admins".to_string()]);
        assert!(!failing.is_allowed(&alice()));
    }

    #[test]
    fn any_group_value_can_satisfy() {
        let filters = FilterConfig::new().with_rule("groups", vec!["exact:Staff".to_string()]);
        assert!(filters.is_allowed(&alice()));
    }

    #[test]
    fn invalid_and_blank_patterns_are_skipped() {
        let only_bad = FilterConfig::new()
            .with_rule("email", vec!["regex:(".to_string(), "   ".to_string()]);
        assert!(!only_bad.is_allowed(&alice()));

        let bad_then_good = FilterConfig::new().with_rule(
            "email",
            vec!["regex:(".to_string(), "alice@".to_string()],
        );
        assert!(bad_then_good.is_allowed(&alice()));
    }

    #[test]
    fn assurance_can_be_required() {
        let filters = FilterConfig::new().with_rule("assurance", vec!["exact:id_token".to_string()]);
        assert!(filters.is_allowed(&alice()));

        let github = Claims::new("github", "42", "https://github.com", Assurance::OAuthProfile);
        assert!(!filters.is_allowed(&github));
    }

    #[test]
    fn deserializes_from_plain_map() {
        let filters: FilterConfig =
            serde_json::from_str(r#"{ "groups": ["str:Admins"] }"#).expect("deserialize");
        assert!(filters.is_allowed(&alice()));
    }
}
