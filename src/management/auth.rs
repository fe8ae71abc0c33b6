use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    error::{AppError, Result},
    management::SessionStore,
    spotify::OAuthApi,
    types::TokenInfo,
};

/// Source of the access token for upstream calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A token that is valid for at least another minute, refreshing first
    /// if necessary.
    async fn get(&self) -> Result<TokenInfo>;

    /// Forces a refresh-token grant and stores the result.
    async fn refresh(&self) -> Result<TokenInfo>;

    /// Forgets the stored credentials; the user has to log in again.
    async fn clear(&self);
}

/// Credentials of one logged-in browser session.
#[derive(Clone)]
pub struct SessionCredentials {
    sessions: SessionStore,
    session_id: String,
    oauth: Arc<dyn OAuthApi>,
}

impl SessionCredentials {
    pub fn new(sessions: SessionStore, session_id: String, oauth: Arc<dyn OAuthApi>) -> Self {
        Self {
            sessions,
            session_id,
            oauth,
        }
    }

    async fn stored_token(&self) -> Result<TokenInfo> {
        self.sessions
            .token(&self.session_id)
            .await
            .ok_or_else(|| AppError::Unauthorized("no Spotify token in session".into()))
    }
}

#[async_trait]
impl CredentialProvider for SessionCredentials {
    async fn get(&self) -> Result<TokenInfo> {
        let token = self.stored_token().await?;
        if token.expires_soon(Utc::now()) {
            debug!(session = %self.session_id, "access token about to expire");
            return self.refresh().await;
        }
        Ok(token)
    }

    async fn refresh(&self) -> Result<TokenInfo> {
        let current = self.stored_token().await?;

        match self.oauth.refresh(&current.refresh_token).await {
            Ok(mut fresh) => {
                if fresh.refresh_token.is_empty() {
                    fresh.refresh_token = current.refresh_token;
                }
                if !self.sessions.set_token(&self.session_id, fresh.clone()).await {
                    return Err(AppError::Unauthorized("session expired".into()));
                }
                Ok(fresh)
            }
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "token refresh failed, clearing credentials");
                self.clear().await;
                Err(AppError::Unauthorized(format!("token refresh failed: {}", e)))
            }
        }
    }

    async fn clear(&self) {
        self.sessions
            .update(&self.session_id, |s| {
                s.token = None;
                s.profile = None;
            })
            .await;
    }
}
