//! In-memory registry of delegated sessions.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata for an issued delegated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Identity the token was granted to.
    pub identity: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last successful lookup.
    pub last_used_at: DateTime<Utc>,
}

/// Thread-safe map from token to session.
///
/// Sessions never expire on their own; they live until revoked or until the
/// process exits.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for the token, replacing any existing one.
    pub fn create_session(&self, token: &str, identity: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            identity: identity.to_string(),
            created_at: now,
            last_used_at: now,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(token.to_string(), session.clone());
        session
    }

    /// Look up a session and mark it used.
    ///
    /// `None` means the token is not a session token; callers fall through
    /// to static-secret verification.
    pub fn validate_session(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let session = sessions.get_mut(token)?;
        session.last_used_at = Utc::now();
        Some(session.clone())
    }

    /// Look up a session without touching `last_used_at`.
    pub fn session_info(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(token).cloned()
    }

    /// Revoke a single session. Returns whether it existed.
    pub fn revoke_session(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token).is_some()
    }

    /// Revoke every session. Returns how many were removed.
    pub fn revoke_all_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let count = sessions.len();
        sessions.clear();
        count
    }

    /// Number of live sessions.
    pub fn active_session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_create_and_validate() {
        let registry = SessionRegistry::new();
        let created = registry.create_session("tok-1", "10.0.0.1");
        assert_eq!(created.created_at, created.last_used_at);

        let session = registry.validate_session("tok-1").unwrap();
        assert_eq!(session.identity, "10.0.0.1");
        assert_eq!(session.created_at, created.created_at);
    }

    #[test]
    fn test_unknown_token_is_absent() {
        let registry = SessionRegistry::new();
        assert!(registry.validate_session("missing").is_none());
    }

    #[test]
    fn test_last_used_advances() {
        let registry = SessionRegistry::new();
        registry.create_session("tok-1", "10.0.0.1");

        let first = registry.validate_session("tok-1").unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let second = registry.validate_session("tok-1").unwrap();

        assert!(second.last_used_at > first.last_used_at);
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_session_info_does_not_refresh() {
        let registry = SessionRegistry::new();
        let created = registry.create_session("tok-1", "10.0.0.1");
        std::thread::sleep(Duration::from_millis(5));

        let info = registry.session_info("tok-1").unwrap();
        assert_eq!(info.last_used_at, created.last_used_at);
    }

    #[test]
    fn test_create_overwrites() {
        let registry = SessionRegistry::new();
        registry.create_session("tok-1", "10.0.0.1");
        registry.create_session("tok-1", "10.0.0.2");

        assert_eq!(registry.active_session_count(), 1);
        assert_eq!(registry.session_info("tok-1").unwrap().identity, "10.0.0.2");
    }

    #[test]
    fn test_revoke() {
        let registry = SessionRegistry::new();
        registry.create_session("tok-1", "10.0.0.1");
        registry.create_session("tok-2", "10.0.0.1");
        registry.create_session("tok-3", "10.0.0.2");

        assert!(registry.revoke_session("tok-1"));
        assert!(!registry.revoke_session("tok-1"));
        assert_eq!(registry.active_session_count(), 2);

        assert_eq!(registry.revoke_all_sessions(), 2);
        assert_eq!(registry.active_session_count(), 0);
        assert!(registry.validate_session("tok-3").is_none());
    }
}
