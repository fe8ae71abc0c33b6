//! # Spotify Integration Module
//!
//! Everything that talks to Spotify lives here. The rest of the crate never
//! sees `reqwest`; it talks to the two traits below, which keeps the
//! analysis pipeline testable against in-memory fakes.
//!
//! ```text
//! HTTP routes / analysis pipeline
//!          ↓
//! AuthorizedClient (token from the session, refresh-once on 401)
//!          ↓
//! MusicApi ── SpotifyClient (retry + backoff around every request)
//! OAuthApi ── SpotifyAuth   (authorize URL, code exchange, refresh grant)
//!          ↓
//! Spotify Web API / Accounts service
//! ```
//!
//! ## Error mapping
//!
//! | Upstream response          | `AppError`                      |
//! |----------------------------|---------------------------------|
//! | 401                        | `Unauthorized`                  |
//! | 403                        | `Forbidden`                     |
//! | 404                        | `NotFound`                      |
//! | 429 after the last attempt | `RateLimited { retry_after }`   |
//! | 5xx after the last attempt | `Upstream { status, message }`  |
//!
//! ## API Coverage
//!
//! - `GET /me`, `GET /me/playlists`
//! - `GET /playlists/{id}`, `GET /playlists/{id}/tracks`
//! - `POST /playlists/{id}/tracks`, `DELETE /playlists/{id}/tracks`
//! - `GET /me/player/recently-played`
//! - `GET /audio-features`
//! - `GET /recommendations`
//! - `POST /api/token` (accounts service)

pub mod auth;
pub mod authorized;
pub mod client;

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{
        AudioFeatures, Page, PlayHistoryItem, PlaylistInfo, PlaylistItem, PlaylistSummary,
        RecommendationRequest, TokenInfo, TrackObject, UserProfile,
    },
};

pub use auth::SpotifyAuth;
pub use authorized::AuthorizedClient;
pub use client::{RetryPolicy, SpotifyClient};

/// Spotify's cap on ids per playlist add/remove call.
pub const PLAYLIST_MUTATION_BATCH: usize = 100;

/// Spotify's cap on seed tracks per recommendation request.
pub const MAX_SEED_TRACKS: usize = 5;

/// Builds the `spotify:track:` URI for a track id.
pub fn track_uri(id: &str) -> String {
    format!("spotify:track:{}", id)
}

/// The subset of the Spotify Web API the service consumes.
///
/// Cursors are opaque: whatever a page reports as `next` is handed back
/// unchanged to fetch the following page.
#[async_trait]
pub trait MusicApi: Send + Sync {
    async fn current_user(&self, token: &str) -> Result<UserProfile>;

    async fn user_playlists(&self, token: &str) -> Result<Vec<PlaylistSummary>>;

    async fn playlist(&self, token: &str, playlist_id: &str) -> Result<PlaylistInfo>;

    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PlaylistItem>>;

    async fn recently_played(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<PlayHistoryItem>>;

    /// One entry per requested id, in request order; `None` where Spotify has
    /// no features for that track.
    async fn audio_features(&self, token: &str, ids: &[String])
    -> Result<Vec<Option<AudioFeatures>>>;

    async fn recommendations(
        &self,
        token: &str,
        request: &RecommendationRequest,
    ) -> Result<Vec<TrackObject>>;

    async fn add_tracks(&self, token: &str, playlist_id: &str, uris: &[String]) -> Result<()>;

    async fn remove_tracks(&self, token: &str, playlist_id: &str, uris: &[String]) -> Result<()>;
}

/// The authorization-code grant against the accounts service.
#[async_trait]
pub trait OAuthApi: Send + Sync {
    /// URL the browser is sent to for consent.
    fn authorize_url(&self, state: &str, code_challenge: &str) -> String;

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenInfo>;

    /// A refresh response may omit the refresh token; callers keep the old one
    /// in that case.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenInfo>;
}
