#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use playlist_tuner::{
    error::{AppError, Result},
    management::CredentialProvider,
    spotify::{MusicApi, OAuthApi},
    types::{
        AlbumRef, ArtistRef, AudioFeatures, Page, PlayHistoryItem, PlaylistInfo, PlaylistItem,
        PlaylistSummary, RecommendationRequest, TokenInfo, TrackObject, UserProfile,
    },
};

pub fn track(id: &str, popularity: u32) -> TrackObject {
    TrackObject {
        id: Some(id.to_string()),
        name: format!("Track {}", id),
        artists: vec![ArtistRef {
            id: Some(format!("{}_artist", id)),
            name: format!("Artist {}", id),
        }],
        popularity,
        duration_ms: 180_000,
        explicit: false,
        preview_url: None,
        album: Some(AlbumRef {
            name: format!("Album {}", id),
            release_date: Some("1999-06-01".to_string()),
            images: Vec::new(),
        }),
    }
}

pub fn item(track: TrackObject) -> PlaylistItem {
    PlaylistItem {
        added_at: Some("2024-01-01T00:00:00Z".to_string()),
        track: Some(track),
    }
}

pub fn features(energy: f64) -> AudioFeatures {
    AudioFeatures {
        energy,
        ..AudioFeatures::default()
    }
}

pub fn token(access: &str) -> TokenInfo {
    TokenInfo {
        access_token: access.to_string(),
        refresh_token: "refresh-token".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
        scope: String::new(),
    }
}

/// Calls the pipeline made against [`FakeSpotify`].
#[derive(Debug, Default)]
pub struct Calls {
    pub track_pages: usize,
    pub feature_batches: Vec<Vec<String>>,
    pub recommendations: Vec<RecommendationRequest>,
    pub added: Vec<Vec<String>>,
    pub removed: Vec<Vec<String>>,
    pub tokens: Vec<String>,
}

/// In-memory stand-in for the Spotify Web API holding one playlist.
#[derive(Default)]
pub struct FakeSpotify {
    pub playlist_id: String,
    pub playlist_name: String,
    pub pages: Vec<Vec<PlaylistItem>>,
    pub features: HashMap<String, AudioFeatures>,
    pub recent: Vec<PlayHistoryItem>,
    pub recommended: Vec<TrackObject>,
    /// Upstream failure for the track page with this index.
    pub failing_page: Option<(usize, u16)>,
    /// Feature batches (by call order) that fail with a 5xx.
    pub failing_feature_batches: HashSet<usize>,
    /// Mutation batches (by call order) that fail with a 5xx.
    pub failing_mutation_batches: HashSet<usize>,
    /// Access tokens answered with 401.
    pub rejected_tokens: HashSet<String>,
    /// The last track page names itself as the next page.
    pub looping_cursor: bool,
    pub calls: Mutex<Calls>,
    pub mutations: AtomicUsize,
}

impl FakeSpotify {
    pub fn with_tracks(playlist_id: &str, tracks: Vec<TrackObject>) -> Self {
        Self {
            playlist_id: playlist_id.to_string(),
            playlist_name: "Test Playlist".to_string(),
            pages: vec![tracks.into_iter().map(item).collect()],
            ..Default::default()
        }
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }

    fn authorize(&self, token: &str) -> Result<()> {
        self.calls().tokens.push(token.to_string());
        if self.rejected_tokens.contains(token) {
            return Err(AppError::Unauthorized("The access token expired".into()));
        }
        Ok(())
    }

    fn known(&self, playlist_id: &str) -> Result<()> {
        if playlist_id == self.playlist_id {
            Ok(())
        } else {
            Err(AppError::NotFound("Resource not found".into()))
        }
    }

    fn mutation(&self) -> Result<()> {
        let index = self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.failing_mutation_batches.contains(&index) {
            return Err(AppError::Upstream {
                status: 502,
                message: "Bad gateway".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MusicApi for FakeSpotify {
    async fn current_user(&self, token: &str) -> Result<UserProfile> {
        self.authorize(token)?;
        Ok(UserProfile {
            id: "listener".into(),
            display_name: "Listener".into(),
            image_url: None,
        })
    }

    async fn user_playlists(&self, token: &str) -> Result<Vec<PlaylistSummary>> {
        self.authorize(token)?;
        Ok(vec![PlaylistSummary {
            id: self.playlist_id.clone(),
            name: self.playlist_name.clone(),
            track_total: self.pages.iter().map(Vec::len).sum::<usize>() as u64,
            owner_id: "listener".into(),
            owner_name: "Listener".into(),
            image_url: None,
        }])
    }

    async fn playlist(&self, token: &str, playlist_id: &str) -> Result<PlaylistInfo> {
        self.authorize(token)?;
        self.known(playlist_id)?;
        Ok(PlaylistInfo {
            id: self.playlist_id.clone(),
            name: self.playlist_name.clone(),
            track_total: self.pages.iter().map(Vec::len).sum::<usize>() as u64,
        })
    }

    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PlaylistItem>> {
        self.authorize(token)?;
        self.known(playlist_id)?;

        let index = cursor
            .and_then(|c| c.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        self.calls().track_pages += 1;

        if let Some((failing, status)) = self.failing_page {
            if failing == index {
                return Err(match status {
                    404 => AppError::NotFound("Resource not found".into()),
                    403 => AppError::Forbidden("Forbidden".into()),
                    _ => AppError::Upstream {
                        status,
                        message: "upstream failure".into(),
                    },
                });
            }
        }

        let items = self.pages.get(index).cloned().unwrap_or_default();
        let next = if index + 1 < self.pages.len() {
            Some(format!("page-{}", index + 1))
        } else if self.looping_cursor {
            Some(format!("page-{}", index))
        } else {
            None
        };
        Ok(Page {
            items,
            next,
            total: None,
        })
    }

    async fn recently_played(
        &self,
        token: &str,
        _cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<PlayHistoryItem>> {
        self.authorize(token)?;
        Ok(Page {
            items: self.recent.iter().take(limit as usize).cloned().collect(),
            next: None,
            total: None,
        })
    }

    async fn audio_features(
        &self,
        token: &str,
        ids: &[String],
    ) -> Result<Vec<Option<AudioFeatures>>> {
        self.authorize(token)?;
        let batch = {
            let mut calls = self.calls();
            calls.feature_batches.push(ids.to_vec());
            calls.feature_batches.len() - 1
        };
        if self.failing_feature_batches.contains(&batch) {
            return Err(AppError::Upstream {
                status: 500,
                message: "Internal server error".into(),
            });
        }
        Ok(ids.iter().map(|id| self.features.get(id).copied()).collect())
    }

    async fn recommendations(
        &self,
        token: &str,
        request: &RecommendationRequest,
    ) -> Result<Vec<TrackObject>> {
        self.authorize(token)?;
        self.calls().recommendations.push(request.clone());
        Ok(self
            .recommended
            .iter()
            .take(request.limit as usize)
            .cloned()
            .collect())
    }

    async fn add_tracks(&self, token: &str, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.authorize(token)?;
        self.known(playlist_id)?;
        self.calls().added.push(uris.to_vec());
        self.mutation()
    }

    async fn remove_tracks(&self, token: &str, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.authorize(token)?;
        self.known(playlist_id)?;
        self.calls().removed.push(uris.to_vec());
        self.mutation()
    }
}

/// Credentials that hand out a fixed token and count refreshes.
pub struct StaticCredentials {
    token: Mutex<TokenInfo>,
    refreshed: String,
    pub refreshes: AtomicUsize,
}

impl StaticCredentials {
    pub fn new(access: &str) -> Self {
        Self::refreshing_to(access, "fresh-token")
    }

    pub fn refreshing_to(access: &str, refreshed: &str) -> Self {
        Self {
            token: Mutex::new(token(access)),
            refreshed: refreshed.to_string(),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn get(&self) -> Result<TokenInfo> {
        Ok(self.token.lock().unwrap().clone())
    }

    async fn refresh(&self) -> Result<TokenInfo> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let fresh = token(&self.refreshed);
        *self.token.lock().unwrap() = fresh.clone();
        Ok(fresh)
    }

    async fn clear(&self) {}
}

/// Accounts service stand-in with a canned token per grant.
#[derive(Default)]
pub struct FakeOAuth {
    pub exchanged: Mutex<Vec<(String, String)>>,
    pub refreshed: Mutex<Vec<String>>,
    pub fail_refresh: bool,
    /// Lifetime in seconds of the tokens handed out by the code exchange.
    pub exchange_lifetime: Option<i64>,
    /// Refresh responses omit the refresh token.
    pub omit_refresh_token: bool,
}

#[async_trait]
impl OAuthApi for FakeOAuth {
    fn authorize_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "https://accounts.example.test/authorize?state={}&code_challenge={}",
            state, code_challenge
        )
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenInfo> {
        self.exchanged
            .lock()
            .unwrap()
            .push((code.to_string(), code_verifier.to_string()));
        if code == "bad-code" {
            return Err(AppError::Unauthorized("invalid_grant".into()));
        }
        let mut issued = token("access-token");
        if let Some(secs) = self.exchange_lifetime {
            issued.expires_at = Utc::now() + Duration::seconds(secs);
        }
        Ok(issued)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenInfo> {
        self.refreshed.lock().unwrap().push(refresh_token.to_string());
        if self.fail_refresh {
            return Err(AppError::Unauthorized("Refresh token revoked".into()));
        }
        let mut fresh = token("fresh-token");
        if self.omit_refresh_token {
            fresh.refresh_token = String::new();
        } else {
            fresh.refresh_token = "rotated-refresh-token".into();
        }
        Ok(fresh)
    }
}
