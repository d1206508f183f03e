//! Per-browser login state.
//!
//! An [`OidcSession`] lives inside the browser's server-side session record.
//! It moves through three phases:
//!
//! ```text
//! Idle --challenge--> Challenged --complete--> Completed
//!                         ^                        |
//!                         +-------challenge--------+
//! ```
//!
//! Starting a login always overwrites any unconsumed challenge. A callback
//! that fails verification leaves the session exactly as it was.

use crate::error::AuthenticationError;
use serde::{Deserialize, Serialize};

/// Opaque identifier carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing session ID.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Generates a fresh ULID-based session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a session is in the login protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Challenged,
    Completed,
}

/// Data recorded when a login begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub provider: String,
    pub state: String,
    pub nonce: String,
    pub redirect_target: String,
    pub remember_me: bool,
    pub pkce_verifier: Option<String>,
}

/// A callback that passed the session checks and may be handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    /// Authorization code from the callback query.
    pub code: String,
    /// Nonce to require in the ID token, if one was issued.
    pub nonce: Option<String>,
    /// PKCE verifier to send with the token request, if one was generated.
    pub pkce_verifier: Option<String>,
}

/// What the caller needs after a successful callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub redirect_target: String,
    pub remember_me: bool,
}

/// OIDC sub-state of a browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcSession {
    provider: String,
    state: String,
    nonce: String,
    redirect_target: String,
    remember_me: bool,
    pkce_verifier: Option<String>,
    subject: String,
    email: String,
}

impl OidcSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current protocol phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if !self.state.is_empty() {
            SessionPhase::Challenged
        } else if !self.subject.is_empty() {
            SessionPhase::Completed
        } else {
            SessionPhase::Idle
        }
    }

    /// Records a new login attempt, replacing any previous challenge or identity.
    pub fn challenge(&mut self, challenge: Challenge) {
        self.provider = challenge.provider;
        self.state = challenge.state;
        self.nonce = challenge.nonce;
        self.redirect_target = challenge.redirect_target;
        self.remember_me = challenge.remember_me;
        self.pkce_verifier = challenge.pkce_verifier.filter(|v| !v.is_empty());
        self.subject.clear();
        self.email.clear();
    }

    /// Checks callback parameters against the pending challenge.
    ///
    /// Does not modify the session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] if there is no pending challenge, the
    /// state differs, the code is absent, or the challenge was issued for a
    /// provider other than `active_provider`.
    pub fn verify_callback(
        &self,
        state: Option<&str>,
        code: Option<&str>,
        active_provider: &str,
    ) -> Result<PendingChallenge, AuthenticationError> {
        if self.state.is_empty() {
            return Err(AuthenticationError::NoPendingChallenge);
        }
        if state != Some(self.state.as_str()) {
            return Err(AuthenticationError::StateMismatch);
        }
        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(AuthenticationError::MissingCode)?;
        if self.provider != active_provider {
            return Err(AuthenticationError::ProviderMismatch {
                expected: active_provider.to_string(),
                found: self.provider.clone(),
            });
        }

        Ok(PendingChallenge {
            code: code.to_string(),
            nonce: Some(self.nonce.clone()).filter(|n| !n.is_empty()),
            pkce_verifier: self.pkce_verifier.clone(),
        })
    }

    /// Marks the login as finished and clears the challenge.
    pub fn complete(&mut self, subject: String, email: String) -> Completion {
        self.subject = subject;
        self.email = email;
        self.state.clear();
        self.nonce.clear();
        self.pkce_verifier = None;
        Completion {
            redirect_target: std::mem::take(&mut self.redirect_target),
            remember_me: std::mem::replace(&mut self.remember_me, false),
        }
    }

    /// Returns true if the session holds an identity from `provider_id`.
    #[must_use]
    pub fn is_authenticated_for(&self, provider_id: &str) -> bool {
        !self.subject.is_empty() && self.provider == provider_id
    }

    /// Forgets everything, returning to idle.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns the provider of the current challenge or identity.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the pending state value. Empty unless challenged.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Returns the pending nonce. Empty unless challenged.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Returns the authenticated subject. Empty unless completed.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the authenticated email, if the provider supplied one.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}
