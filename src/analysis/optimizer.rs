//! Pruning a playlist by popularity and energy.
//!
//! [`evaluate`] decides which tracks go; [`apply`] removes them in batches
//! and asks Spotify for replacements.

use std::{collections::HashSet, future::Future, time::Duration};

use tracing::{error, info, warn};

use crate::{
    error::{AppError, Result},
    spotify::{AuthorizedClient, MAX_SEED_TRACKS, PLAYLIST_MUTATION_BATCH, track_uri},
    types::{
        AnalysisResult, OptimizationCriteria, OptimizationOutcome, OptimizationPlan,
        RecommendationRequest, SimilarTrack, Track, TrackObject, TrackVerdict,
    },
};

/// Upper bound on replacements requested in one optimization.
pub const MAX_REPLACEMENTS: usize = 20;

impl OptimizationCriteria {
    /// Rejects thresholds outside their scales, including a NaN energy.
    pub fn validate(&self) -> Result<()> {
        if self.min_popularity > 100 {
            return Err(AppError::BadRequest(format!(
                "minPopularity must be between 0 and 100, got {}",
                self.min_popularity
            )));
        }
        if !(0.0..=1.0).contains(&self.min_energy) {
            return Err(AppError::BadRequest(format!(
                "minEnergy must be between 0.0 and 1.0, got {}",
                self.min_energy
            )));
        }
        Ok(())
    }
}

/// Splits analyzed tracks into keep and remove lists. Deterministic for a
/// given analysis and criteria.
pub fn evaluate(analysis: &AnalysisResult, criteria: &OptimizationCriteria) -> OptimizationPlan {
    let mut plan = OptimizationPlan::default();

    for track in &analysis.tracks {
        let energy = track.features.energy;
        let mut reasons = Vec::new();

        if track.popularity < criteria.min_popularity {
            reasons.push(format!("Low popularity ({}%)", track.popularity));
        }
        if energy < criteria.min_energy {
            reasons.push(format!("Low energy ({}%)", (energy * 100.0).round() as i64));
        }

        let verdict = verdict(track, reasons);
        if verdict.reasons.is_empty() {
            plan.keep.push(verdict);
        } else {
            plan.remove.push(verdict);
        }
    }

    plan
}

fn verdict(track: &Track, reasons: Vec<String>) -> TrackVerdict {
    TrackVerdict {
        id: track.id.clone(),
        name: track.name.clone(),
        artist: track
            .artists
            .first()
            .cloned()
            .unwrap_or_else(|| "Unknown Artist".to_string()),
        popularity: track.popularity,
        energy: track.features.energy,
        reasons,
    }
}

/// Ids in first-seen order without repeats.
pub fn unique_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Carries out a plan against the playlist.
///
/// Nothing upstream is mutated unless `criteria.auto_remove` is set.
/// Failed removal or addition batches are logged and left out of the
/// reported counts.
pub async fn apply(
    client: &AuthorizedClient<'_>,
    analysis: &AnalysisResult,
    plan: OptimizationPlan,
    criteria: OptimizationCriteria,
    batch_delay: Duration,
) -> OptimizationOutcome {
    let playlist_id = analysis.playlist_id.as_str();
    let remove_ids = unique_ids(plan.remove.iter().map(|v| v.id.as_str()));

    let tracks_removed = if criteria.auto_remove && !remove_ids.is_empty() {
        let uris: Vec<String> = remove_ids.iter().map(|id| track_uri(id)).collect();
        let removed = mutate_in_batches(&uris, batch_delay, |batch| async move {
            client.remove_tracks(playlist_id, &batch).await
        })
        .await;
        info!(playlist = %playlist_id, removed, "removed tracks");
        removed
    } else {
        0
    };

    let wants_replacements =
        criteria.replace_removed && !plan.remove.is_empty() && !plan.keep.is_empty();
    let recommendations = if wants_replacements {
        replacements(client, analysis, &plan, &criteria).await
    } else {
        Vec::new()
    };

    let tracks_added = if criteria.auto_remove && !recommendations.is_empty() {
        let uris: Vec<String> = recommendations.iter().map(|t| track_uri(&t.id)).collect();
        let added = mutate_in_batches(&uris, batch_delay, |batch| async move {
            client.add_tracks(playlist_id, &batch).await
        })
        .await;
        info!(playlist = %playlist_id, added, "added replacement tracks");
        added
    } else {
        0
    };

    OptimizationOutcome {
        playlist_name: analysis.playlist_name.clone(),
        tracks_analyzed: analysis.tracks.len(),
        tracks_to_remove: plan.remove,
        tracks_removed,
        recommendations,
        tracks_added,
        criteria_used: criteria,
    }
}

async fn replacements(
    client: &AuthorizedClient<'_>,
    analysis: &AnalysisResult,
    plan: &OptimizationPlan,
    criteria: &OptimizationCriteria,
) -> Vec<SimilarTrack> {
    let mut seeds = unique_ids(plan.keep.iter().map(|v| v.id.as_str()));
    seeds.truncate(MAX_SEED_TRACKS);

    let target_energy =
        plan.keep.iter().map(|v| v.energy).sum::<f64>() / plan.keep.len() as f64;
    let limit = plan.remove.len().min(MAX_REPLACEMENTS) as u32;

    let request = RecommendationRequest {
        seed_tracks: seeds,
        limit,
        target_energy: Some(target_energy),
        min_popularity: Some(criteria.min_popularity),
    };

    match client.recommendations(&request).await {
        Ok(tracks) => fresh_tracks(analysis.tracks.iter().map(|t| t.id.as_str()), &tracks),
        Err(e) => {
            warn!(playlist = %analysis.playlist_id, error = %e, "recommendation request failed");
            Vec::new()
        }
    }
}

/// Recommendation rows for tracks not already in the playlist, without
/// repeats.
pub fn fresh_tracks<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    tracks: &[TrackObject],
) -> Vec<SimilarTrack> {
    let present: HashSet<&str> = existing.into_iter().collect();
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter_map(SimilarTrack::from_track)
        .filter(|t| !present.contains(t.id.as_str()) && seen.insert(t.id.clone()))
        .collect()
}

/// Runs `op` over `uris` in chunks of the playlist mutation limit, sleeping
/// `delay` between chunks. Returns how many uris were in successful chunks.
pub async fn mutate_in_batches<F, Fut>(uris: &[String], delay: Duration, op: F) -> usize
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut done = 0;
    for (index, batch) in uris.chunks(PLAYLIST_MUTATION_BATCH).enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match op(batch.to_vec()).await {
            Ok(()) => done += batch.len(),
            Err(e) => error!(batch = index, size = batch.len(), error = %e, "playlist update failed"),
        }
    }
    done
}
