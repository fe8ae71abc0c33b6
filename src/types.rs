use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Spotify Web API payloads.

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// A track object as returned inside playlist pages, recent plays and
/// recommendations. Local files and unavailable tracks carry no id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
}

impl TrackObject {
    pub fn first_artist(&self) -> String {
        self.artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown Artist".to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub track: Option<TrackObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistoryItem {
    pub track: TrackObject,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioFeaturesResponse {
    pub audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationsResponse {
    pub tracks: Vec<TrackObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracksRef {
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerRef {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
    pub tracks: PlaylistTracksRef,
    pub owner: OwnerRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistObject {
    pub id: String,
    pub name: String,
    pub tracks: PlaylistTracksRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserObject {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UriRef {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveTracksRequest {
    pub tracks: Vec<UriRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTracksRequest {
    pub uris: Vec<String>,
}

// Session and profile state.

#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

impl TokenInfo {
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or_default(),
            expires_at: now + chrono::Duration::seconds(response.expires_in),
            scope: response.scope.unwrap_or_default(),
        }
    }

    /// True once fewer than 60 seconds of validity remain.
    pub fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < chrono::Duration::seconds(60)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub image_url: Option<String>,
}

impl From<UserObject> for UserProfile {
    fn from(user: UserObject) -> Self {
        let image_url = user
            .images
            .as_ref()
            .and_then(|images| images.first())
            .map(|i| i.url.clone());
        Self {
            display_name: user.display_name.unwrap_or_else(|| user.id.clone()),
            id: user.id,
            image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub track_total: u64,
    pub owner_id: String,
    pub owner_name: String,
    pub image_url: Option<String>,
}

impl From<SimplifiedPlaylist> for PlaylistSummary {
    fn from(p: SimplifiedPlaylist) -> Self {
        let image_url = p
            .images
            .as_ref()
            .and_then(|images| images.first())
            .map(|i| i.url.clone());
        Self {
            id: p.id,
            name: p.name,
            track_total: p.tracks.total,
            owner_name: p.owner.display_name.unwrap_or_else(|| p.owner.id.clone()),
            owner_id: p.owner.id,
            image_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
    pub track_total: u64,
}

impl From<PlaylistObject> for PlaylistInfo {
    fn from(p: PlaylistObject) -> Self {
        Self {
            id: p.id,
            name: p.name,
            track_total: p.tracks.total,
        }
    }
}

// Analysis model.

/// Derived audio metrics of a track.
///
/// `Default` is the fallback record used whenever the upstream service has
/// no features for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    #[serde(default = "half")]
    pub energy: f64,
    #[serde(default = "half")]
    pub danceability: f64,
    #[serde(default = "half")]
    pub valence: f64,
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    #[serde(default = "half")]
    pub acousticness: f64,
    #[serde(default)]
    pub instrumentalness: f64,
}

fn half() -> f64 {
    0.5
}

fn default_tempo() -> f64 {
    120.0
}

impl Default for AudioFeatures {
    fn default() -> Self {
        Self {
            energy: 0.5,
            danceability: 0.5,
            valence: 0.5,
            tempo: 120.0,
            acousticness: 0.5,
            instrumentalness: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSource {
    Upstream,
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnrichedFeatures {
    pub features: AudioFeatures,
    pub source: FeatureSource,
}

impl EnrichedFeatures {
    pub fn upstream(features: AudioFeatures) -> Self {
        Self {
            features,
            source: FeatureSource::Upstream,
        }
    }

    pub fn defaulted() -> Self {
        Self {
            features: AudioFeatures::default(),
            source: FeatureSource::Defaulted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub added_at: Option<String>,
    pub track: TrackObject,
}

/// The full contents of one playlist at fetch time.
#[derive(Debug, Clone)]
pub struct PlaylistSnapshot {
    pub id: String,
    pub name: String,
    pub track_count: u64,
    pub entries: Vec<PlaylistEntry>,
}

impl PlaylistSnapshot {
    /// Ids of all entries that carry one, in playlist order.
    pub fn track_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| e.track.id.clone())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentPlayRecord {
    pub track_id: String,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub release_date: String,
    pub added_at: Option<String>,
    pub popularity: u32,
    pub duration_ms: u64,
    pub explicit: bool,
    pub preview_url: Option<String>,
    pub features: AudioFeatures,
    pub feature_source: FeatureSource,
    pub last_played: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub playlist_id: String,
    pub playlist_name: String,
    pub total_tracks: usize,
    pub analyzed_tracks: usize,
    pub skipped_tracks: usize,
    pub played_tracks: usize,
    pub inactive_tracks: usize,
    pub duplicates: Vec<String>,
    pub total_duration_ms: u64,
    pub explicit_tracks: usize,
    pub preview_available: usize,
    pub defaulted_features: usize,
    pub popularity_distribution: Vec<DistributionBucket>,
    pub decade_distribution: Vec<DistributionBucket>,
    pub energy_distribution: Vec<DistributionBucket>,
    pub artist_distribution: Vec<DistributionBucket>,
    pub average_popularity: f64,
    pub average_energy: f64,
    pub average_tempo: f64,
    pub average_danceability: f64,
    pub average_valence: f64,
    pub explicit_percentage: f64,
    pub preview_percentage: f64,
    pub active_percentage: f64,
    pub tracks: Vec<Track>,
}

fn default_min_popularity() -> u32 {
    30
}

fn default_min_energy() -> f64 {
    0.2
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationCriteria {
    #[serde(default = "default_min_popularity")]
    pub min_popularity: u32,
    #[serde(default = "default_min_energy")]
    pub min_energy: f64,
    #[serde(default)]
    pub auto_remove: bool,
    #[serde(default)]
    pub replace_removed: bool,
}

impl Default for OptimizationCriteria {
    fn default() -> Self {
        Self {
            min_popularity: default_min_popularity(),
            min_energy: default_min_energy(),
            auto_remove: false,
            replace_removed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackVerdict {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub popularity: u32,
    pub energy: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationPlan {
    pub keep: Vec<TrackVerdict>,
    pub remove: Vec<TrackVerdict>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarTrack {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub popularity: u32,
    pub preview_url: Option<String>,
    pub image: Option<String>,
}

impl SimilarTrack {
    pub fn from_track(track: &TrackObject) -> Option<Self> {
        let id = track.id.clone().filter(|id| !id.is_empty())?;
        Some(Self {
            id,
            name: track.name.clone(),
            artist: track.first_artist(),
            popularity: track.popularity,
            preview_url: track.preview_url.clone(),
            image: track
                .album
                .as_ref()
                .and_then(|a| a.images.first())
                .map(|i| i.url.clone()),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationOutcome {
    pub playlist_name: String,
    pub tracks_analyzed: usize,
    pub tracks_to_remove: Vec<TrackVerdict>,
    pub tracks_removed: usize,
    pub recommendations: Vec<SimilarTrack>,
    pub tracks_added: usize,
    pub criteria_used: OptimizationCriteria,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentChange {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistChanges {
    pub playlist_name: String,
    pub total_tracks: usize,
    pub recent_changes: Vec<RecentChange>,
}

#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub seed_tracks: Vec<String>,
    pub limit: u32,
    pub target_energy: Option<f64>,
    pub min_popularity: Option<u32>,
}
