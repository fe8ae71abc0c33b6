//! # Playlist Analysis Pipeline
//!
//! Fetch, enrich, analyze and optimize a single playlist on behalf of one
//! user.
//!
//! ```text
//! fetcher   → PlaylistSnapshot + recent plays
//! enricher  → id → EnrichedFeatures (never fails)
//! analyzer  → AnalysisResult (pure)
//! optimizer → OptimizationPlan (pure) → OptimizationOutcome
//! ```
//!
//! Fetch-phase errors abort the request. Enrichment and per-track problems
//! degrade to default values and are visible in the result counts.

pub mod analyzer;
pub mod enricher;
pub mod fetcher;
pub mod optimizer;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    config::Config,
    error::{AppError, Result},
    management::CredentialProvider,
    spotify::{AuthorizedClient, MAX_SEED_TRACKS, MusicApi, PLAYLIST_MUTATION_BATCH, track_uri},
    types::{
        AnalysisResult, OptimizationCriteria, OptimizationOutcome, PlaylistChanges,
        PlaylistSummary, RecentChange, RecommendationRequest, SimilarTrack, UserProfile,
    },
    utils,
};

pub use enricher::FeatureEnricher;

/// Number of newest additions reported by [`PlaylistPipeline::changes`].
pub const RECENT_CHANGES_LIMIT: usize = 10;
pub const DEFAULT_SIMILAR_LIMIT: u32 = 20;
pub const MAX_SIMILAR_LIMIT: u32 = 100;
/// Popularity floor for similar-track suggestions.
pub const SIMILAR_MIN_POPULARITY: u32 = 30;

/// Batching and history settings of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub feature_batch_size: usize,
    pub batch_delay: Duration,
    pub recent_play_limit: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            feature_batch_size: 50,
            batch_delay: Duration::from_secs(1),
            recent_play_limit: 50,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            feature_batch_size: config.feature_batch_size,
            batch_delay: config.batch_delay,
            ..Default::default()
        }
    }
}

/// Runs the analysis steps for one user against a shared [`MusicApi`].
pub struct PlaylistPipeline {
    api: Arc<dyn MusicApi>,
    options: PipelineOptions,
}

impl PlaylistPipeline {
    /// Pipeline that talks to Spotify through `api`.
    pub fn new(api: Arc<dyn MusicApi>, options: PipelineOptions) -> Self {
        Self { api, options }
    }

    fn client<'a>(&'a self, credentials: &'a dyn CredentialProvider) -> AuthorizedClient<'a> {
        AuthorizedClient::new(self.api.as_ref(), credentials)
    }

    /// The logged-in user's profile.
    pub async fn profile(&self, credentials: &dyn CredentialProvider) -> Result<UserProfile> {
        self.client(credentials).current_user().await
    }

    /// Every playlist the user owns or follows.
    pub async fn playlists(
        &self,
        credentials: &dyn CredentialProvider,
    ) -> Result<Vec<PlaylistSummary>> {
        self.client(credentials).user_playlists().await
    }

    /// Full analysis of one playlist, including the per-track detail list.
    pub async fn analyze(
        &self,
        credentials: &dyn CredentialProvider,
        playlist_id: &str,
    ) -> Result<AnalysisResult> {
        let client = self.client(credentials);

        let snapshot = fetcher::fetch_playlist(&client, playlist_id).await?;
        let recent = fetcher::fetch_recent_plays(&client, self.options.recent_play_limit).await?;

        let enricher =
            FeatureEnricher::new(self.options.feature_batch_size, self.options.batch_delay);
        let features = enricher.enrich(&client, &snapshot.track_ids()).await;

        let analysis = analyzer::analyze(&snapshot, &features, &recent);
        info!(
            playlist = %playlist_id,
            analyzed = analysis.tracks.len(),
            skipped = analysis.skipped_tracks,
            defaulted = analysis.defaulted_features,
            "analysis complete"
        );
        Ok(analysis)
    }

    /// Analyzes the playlist, evaluates `criteria` and applies the plan.
    pub async fn optimize(
        &self,
        credentials: &dyn CredentialProvider,
        playlist_id: &str,
        criteria: OptimizationCriteria,
    ) -> Result<OptimizationOutcome> {
        criteria.validate()?;

        let analysis = self.analyze(credentials, playlist_id).await?;
        let plan = optimizer::evaluate(&analysis, &criteria);
        info!(
            playlist = %playlist_id,
            keep = plan.keep.len(),
            remove = plan.remove.len(),
            auto_remove = criteria.auto_remove,
            "optimization plan ready"
        );

        let client = self.client(credentials);
        Ok(optimizer::apply(&client, &analysis, plan, criteria, self.options.batch_delay).await)
    }

    /// Recommendations seeded from the first tracks of the playlist, minus
    /// tracks it already contains.
    pub async fn similar(
        &self,
        credentials: &dyn CredentialProvider,
        playlist_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SimilarTrack>> {
        let limit = limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
        if !(1..=MAX_SIMILAR_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_SIMILAR_LIMIT, limit
            )));
        }

        let client = self.client(credentials);
        let snapshot = fetcher::fetch_playlist(&client, playlist_id).await?;

        let mut seeds = optimizer::unique_ids(snapshot.track_ids().iter().map(String::as_str));
        seeds.truncate(MAX_SEED_TRACKS);
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let enricher =
            FeatureEnricher::new(self.options.feature_batch_size, self.options.batch_delay);
        let features = enricher.enrich(&client, &seeds).await;
        let target_energy = if features.is_empty() {
            0.5
        } else {
            features.values().map(|f| f.features.energy).sum::<f64>() / features.len() as f64
        };

        let request = RecommendationRequest {
            seed_tracks: seeds,
            limit,
            target_energy: Some(target_energy),
            min_popularity: Some(SIMILAR_MIN_POPULARITY),
        };
        let tracks = client.recommendations(&request).await?;

        Ok(optimizer::fresh_tracks(
            snapshot.track_ids().iter().map(String::as_str),
            &tracks,
        ))
    }

    /// Appends `track_ids` to the playlist. Any failing batch fails the call.
    pub async fn add_tracks(
        &self,
        credentials: &dyn CredentialProvider,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<usize> {
        utils::validate_playlist_id(playlist_id)?;
        if track_ids.is_empty() {
            return Err(AppError::BadRequest("no tracks to add".into()));
        }
        if let Some(bad) = track_ids
            .iter()
            .find(|id| id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(AppError::BadRequest(format!("invalid track id: {}", bad)));
        }

        let client = self.client(credentials);
        let uris: Vec<String> = track_ids.iter().map(|id| track_uri(id)).collect();
        for (index, batch) in uris.chunks(PLAYLIST_MUTATION_BATCH).enumerate() {
            if index > 0 && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }
            client.add_tracks(playlist_id, batch).await?;
        }

        info!(playlist = %playlist_id, added = uris.len(), "added tracks");
        Ok(uris.len())
    }

    /// The most recently added tracks, newest first.
    pub async fn changes(
        &self,
        credentials: &dyn CredentialProvider,
        playlist_id: &str,
    ) -> Result<PlaylistChanges> {
        let client = self.client(credentials);
        let snapshot = fetcher::fetch_playlist(&client, playlist_id).await?;

        let mut changes: Vec<(Option<DateTime<Utc>>, RecentChange)> = snapshot
            .entries
            .iter()
            .filter_map(|entry| {
                let id = entry.track.id.clone().filter(|id| !id.is_empty())?;
                let added = entry
                    .added_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|d| d.with_timezone(&Utc));
                Some((
                    added,
                    RecentChange {
                        id,
                        name: entry.track.name.clone(),
                        artists: entry.track.artists.iter().map(|a| a.name.clone()).collect(),
                        added_at: entry.added_at.clone(),
                    },
                ))
            })
            .collect();

        // Stable sort keeps playlist order among equal or missing timestamps
        changes.sort_by(|a, b| b.0.cmp(&a.0));
        changes.truncate(RECENT_CHANGES_LIMIT);

        Ok(PlaylistChanges {
            playlist_name: snapshot.name,
            total_tracks: snapshot.entries.len(),
            recent_changes: changes.into_iter().map(|(_, c)| c).collect(),
        })
    }
}
