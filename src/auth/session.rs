//! Opaque bearer sessions.
//!
//! Login hands out a random UUID v4 token that maps to a user id until it
//! expires. State is in-memory only, so every session is dropped on restart.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// An issued login session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Token -> session lookup
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Creates a registry whose sessions live for `hours`.
    pub fn with_ttl_hours(hours: u64) -> Self {
        let hours = i64::try_from(hours).unwrap_or(i64::MAX);
        let ttl = Duration::try_hours(hours).unwrap_or(Duration::MAX);
        Self::new(ttl)
    }

    /// Starts a new session for `user_id`.
    pub fn issue(&self, user_id: Uuid) -> Session {
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id,
            issued_at,
            expires_at,
        };
        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Returns the user behind `token`, evicting it if expired.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let session = self.sessions.get(token).map(|s| s.clone())?;
        if session.is_expired_at(Utc::now()) {
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    /// Ends a session. Returns false if the token was unknown.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
