//! Access control for ssogate logins.
//!
//! This crate holds everything about a federated login that does not touch
//! the network:
//! - Provider configuration (`OidcConfig`, `ProviderConfig`)
//! - The claim filter engine (`FilterConfig`) and its pattern matchers
//! - The per-browser login state machine (`OidcSession`)
//! - Redirect target sanitization
//!
//! # Filters
//!
//! A filter maps claim keys to pattern lists. Patterns under one key are
//! alternatives; every configured key must be satisfied.
//!
//! ```
//! use ssogate_access::FilterConfig;
//! use ssogate_core::{Assurance, Claims};
//!
//! let filters = FilterConfig::new()
//!     .with_rule("groups", vec!["str:Admins".to_string()])
//!     .with_rule("email", vec![r"@example\.com$".to_string()]);
//!
//! let claims = Claims::new("custom", "u-1", "https://idp.example.com", Assurance::IdToken)
//!     .with_email("alice@EXAMPLE.com", Some(true))
//!     .with_groups(vec!["admins".to_string()]);
//!
//! assert!(filters.is_allowed(&claims));
//! ```

pub mod error;
pub mod filter;
pub mod matcher;
pub mod oidc;
pub mod redirect;
pub mod session;

// Re-export main types at crate root
pub use error::{AuthenticationError, ConfigError};
pub use filter::FilterConfig;
pub use matcher::Matcher;
pub use oidc::{OidcConfig, OidcConfigBuilder, ProviderConfig};
pub use redirect::{parse_bool_query, sanitize_redirect_path};
pub use session::{Challenge, Completion, OidcSession, PendingChallenge, SessionId, SessionPhase};
