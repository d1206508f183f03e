//! Server-side session storage.
//!
//! The browser only holds an opaque [`SessionId`]; the login state lives
//! behind a [`SessionStore`]. Every record carries an expiry so abandoned
//! logins do not accumulate.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ssogate_access::{OidcSession, SessionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence for per-browser login state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session stored under `id`, if any and not expired.
    async fn load(&self, id: &SessionId) -> Option<OidcSession>;

    /// Stores `session` under `id` for `ttl`, replacing any previous value.
    async fn save(&self, id: &SessionId, session: OidcSession, ttl: ChronoDuration);

    /// Removes the session stored under `id`.
    async fn remove(&self, id: &SessionId);

    /// Drops every expired session and returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

#[derive(Debug, Clone)]
struct StoredSession {
    session: OidcSession,
    expires_at: DateTime<Utc>,
}

impl StoredSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Process-local session store. Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, StoredSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Option<OidcSession> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return None,
                Some(stored) if !stored.is_expired(now) => return Some(stored.session.clone()),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|stored| stored.is_expired(now)) {
            sessions.remove(id);
        }
        None
    }

    async fn save(&self, id: &SessionId, session: OidcSession, ttl: ChronoDuration) {
        let stored = StoredSession {
            session,
            expires_at: Utc::now() + ttl,
        };
        self.sessions.write().await.insert(id.clone(), stored);
    }

    async fn remove(&self, id: &SessionId) {
        self.sessions.write().await.remove(id);
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| !stored.is_expired(now));
        before - sessions.len()
    }
}
