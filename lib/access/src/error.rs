//! Error types for the access crate.
//!
//! Both enums are plain values that the server maps to HTTP statuses:
//! - `ConfigError`: Provider configuration problems, raised at construction
//! - `AuthenticationError`: Login protocol checks that reject a callback

use std::fmt;

/// Errors from reading or validating provider configuration.
///
/// These are raised synchronously when a provider is built, never later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field the provider cannot work without is blank.
    MissingField {
        provider: String,
        field: &'static str,
    },
    /// No adapter is registered under this provider name.
    UnsupportedProvider { name: String },
    /// The active provider has no configuration block.
    ProviderNotConfigured { name: String },
    /// A configured URL could not be parsed.
    InvalidUrl { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { provider, field } => {
                write!(f, "{provider} provider requires {field}")
            }
            Self::UnsupportedProvider { name } => {
                write!(f, "OIDC provider '{name}' is not supported")
            }
            Self::ProviderNotConfigured { name } => {
                write!(f, "OIDC provider '{name}' has no configuration")
            }
            Self::InvalidUrl { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Reasons a login callback is refused.
///
/// Every variant surfaces to the browser as the same 401; the variant is
/// only for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The session holds no login in progress.
    NoPendingChallenge,
    /// The `state` parameter is absent or differs from the stored one.
    StateMismatch,
    /// The `code` parameter is absent.
    MissingCode,
    /// The login was started against a different provider.
    ProviderMismatch { expected: String, found: String },
    /// The provider returned claims without a subject.
    MissingSubject,
    /// The claim filter denied the subject.
    FilterRejected { subject: String },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPendingChallenge => write!(f, "no login in progress for this session"),
            Self::StateMismatch => write!(f, "oidc state mismatch"),
            Self::MissingCode => write!(f, "missing oidc code"),
            Self::ProviderMismatch { expected, found } => {
                write!(f, "oidc provider mismatch: expected '{expected}', session has '{found}'")
            }
            Self::MissingSubject => write!(f, "oidc subject missing"),
            Self::FilterRejected { subject } => {
                write!(f, "oidc filter rejected subject '{subject}'")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}
