use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::{TokenInfo, UserProfile};

/// Server-side state of one browser session.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub token: Option<TokenInfo>,
    pub profile: Option<UserProfile>,
    pub oauth_state: Option<String>,
    pub code_verifier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory session store keyed by the id carried in the session cookie.
///
/// A session lives for a fixed lifetime from its creation; an expired entry
/// is dropped the next time it is looked up.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionData>>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime_hours: i64) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            lifetime: Duration::hours(lifetime_hours.max(1)),
        }
    }

    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(
            id.clone(),
            SessionData {
                token: None,
                profile: None,
                oauth_state: None,
                code_verifier: None,
                created_at: now,
                expires_at: now + self.lifetime,
            },
        );
        id
    }

    pub async fn get(&self, id: &str) -> Option<SessionData> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(id) {
            Some(session) if session.is_expired(Utc::now()) => {
                sessions.remove(id);
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    /// Applies `f` to a live session. Returns `false` when the session is
    /// unknown or expired.
    pub async fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut SessionData),
    {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(id) {
            Some(session) if !session.is_expired(Utc::now()) => {
                f(session);
                true
            }
            _ => false,
        }
    }

    pub async fn token(&self, id: &str) -> Option<TokenInfo> {
        self.get(id).await.and_then(|s| s.token)
    }

    pub async fn set_token(&self, id: &str, token: TokenInfo) -> bool {
        self.update(id, |s| s.token = Some(token)).await
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    #[cfg(test)]
    async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_and_remove_round_trip() {
        let store = SessionStore::new(24);
        let id = store.create().await;

        assert!(store.update(&id, |s| s.oauth_state = Some("abc".into())).await);
        let session = store.get(&id).await.unwrap();
        assert_eq!(session.oauth_state.as_deref(), Some("abc"));
        assert!(session.expires_at > session.created_at);

        store.remove(&id).await;
        assert!(store.get(&id).await.is_none());
        assert!(!store.update(&id, |s| s.token = None).await);
    }

    #[tokio::test]
    async fn expired_sessions_are_evicted_on_lookup() {
        let store = SessionStore::new(1);
        let id = store.create().await;
        assert!(
            store
                .update(&id, |s| s.expires_at = Utc::now() - Duration::seconds(1))
                .await
        );

        assert!(!store.update(&id, |s| s.token = None).await);
        assert!(store.get(&id).await.is_none());
        assert!(store.is_empty().await);
    }
}
