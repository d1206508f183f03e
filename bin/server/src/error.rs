//! Domain error types for identity provider operations.
//!
//! Provider failures are reported as `rootcause::Report<ProviderError>` so
//! the orchestrator can attach request context before logging.

use std::fmt;

/// Result of a provider round trip.
pub type ProviderResult<T> = ssogate_core::Result<T, ProviderError>;

/// Errors raised while talking to an identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider settings could not be turned into a client.
    Configuration { details: String },
    /// Metadata discovery failed.
    Discovery { issuer: String, details: String },
    /// The provider did not answer in time.
    Timeout { operation: &'static str },
    /// The token endpoint refused the code or could not be reached.
    TokenExchange { details: String },
    /// The token response carried no ID token.
    MissingIdToken,
    /// Signature, issuer, audience or expiry checks failed.
    TokenValidation { details: String },
    /// The ID token's nonce differs from the one issued at login.
    NonceMismatch,
    /// PKCE is enabled but the login stored no verifier.
    MissingPkceVerifier,
    /// A REST profile request failed.
    ProfileLookup { resource: &'static str, details: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "provider configuration error: {}", details)
            }
            Self::Discovery { issuer, details } => {
                write!(f, "discovery of '{}' failed: {}", issuer, details)
            }
            Self::Timeout { operation } => write!(f, "{} timed out", operation),
            Self::TokenExchange { details } => write!(f, "token exchange failed: {}", details),
            Self::MissingIdToken => write!(f, "oidc id_token missing"),
            Self::TokenValidation { details } => {
                write!(f, "id token validation failed: {}", details)
            }
            Self::NonceMismatch => write!(f, "oidc nonce mismatch"),
            Self::MissingPkceVerifier => write!(f, "oidc pkce verifier missing"),
            Self::ProfileLookup { resource, details } => {
                write!(f, "fetching {} failed: {}", resource, details)
            }
        }
    }
}

impl std::error::Error for ProviderError {}
