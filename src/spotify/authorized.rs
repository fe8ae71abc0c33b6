use std::future::Future;

use tracing::debug;

use crate::{
    error::{AppError, Result},
    management::CredentialProvider,
    spotify::MusicApi,
    types::{
        AudioFeatures, Page, PlayHistoryItem, PlaylistInfo, PlaylistItem, PlaylistSummary,
        RecommendationRequest, TrackObject, UserProfile,
    },
};

/// A [`MusicApi`] bound to the credentials of one user.
///
/// Every call fetches a token from the provider, and an upstream `401` causes
/// exactly one forced refresh followed by one more attempt.
#[derive(Clone, Copy)]
pub struct AuthorizedClient<'a> {
    api: &'a dyn MusicApi,
    credentials: &'a dyn CredentialProvider,
}

impl<'a> AuthorizedClient<'a> {
    pub fn new(api: &'a dyn MusicApi, credentials: &'a dyn CredentialProvider) -> Self {
        Self { api, credentials }
    }

    /// Runs `op` with the current access token. An `Unauthorized` answer
    /// triggers one refresh and one more attempt with the new token.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.credentials.get().await?;
        match op(token.access_token).await {
            Err(AppError::Unauthorized(reason)) => {
                debug!(%reason, "upstream rejected the access token, refreshing");
                let fresh = self.credentials.refresh().await?;
                op(fresh.access_token).await
            }
            other => other,
        }
    }

    pub async fn current_user(&self) -> Result<UserProfile> {
        let api = self.api;
        self.call(|token| async move { api.current_user(&token).await })
            .await
    }

    pub async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let api = self.api;
        self.call(|token| async move { api.user_playlists(&token).await })
            .await
    }

    pub async fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo> {
        let api = self.api;
        self.call(|token| async move { api.playlist(&token, playlist_id).await })
            .await
    }

    pub async fn playlist_tracks(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PlaylistItem>> {
        let api = self.api;
        self.call(|token| async move { api.playlist_tracks(&token, playlist_id, cursor).await })
            .await
    }

    pub async fn recently_played(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<PlayHistoryItem>> {
        let api = self.api;
        self.call(|token| async move { api.recently_played(&token, cursor, limit).await })
            .await
    }

    pub async fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<AudioFeatures>>> {
        let api = self.api;
        self.call(|token| async move { api.audio_features(&token, ids).await })
            .await
    }

    pub async fn recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<TrackObject>> {
        let api = self.api;
        self.call(|token| async move { api.recommendations(&token, request).await })
            .await
    }

    pub async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let api = self.api;
        self.call(|token| async move { api.add_tracks(&token, playlist_id, uris).await })
            .await
    }

    pub async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let api = self.api;
        self.call(|token| async move { api.remove_tracks(&token, playlist_id, uris).await })
            .await
    }
}
