//! Playlist statistics.
//!
//! Turns a fetched snapshot, its enriched features and the user's recent
//! plays into an [`AnalysisResult`]. Nothing in here touches the network.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    types::{
        AnalysisResult, DistributionBucket, EnrichedFeatures, FeatureSource, PlaylistSnapshot,
        RecentPlayRecord, Track,
    },
    utils,
};

/// Computes the statistics of a fetched playlist.
///
/// Pure: every input is already materialized and nothing here fails. An
/// entry without a usable id is counted in `skipped_tracks` and left out of
/// every aggregate. Tracks missing from `features` use the default record.
pub fn analyze(
    snapshot: &PlaylistSnapshot,
    features: &HashMap<String, EnrichedFeatures>,
    recent: &[RecentPlayRecord],
) -> AnalysisResult {
    let last_played = latest_plays(recent);

    let mut result = AnalysisResult {
        playlist_id: snapshot.id.clone(),
        playlist_name: snapshot.name.clone(),
        total_tracks: snapshot.entries.len(),
        ..Default::default()
    };

    let mut seen = HashSet::new();
    let mut popularity = HashMap::new();
    let mut decades = HashMap::new();
    let mut energy = HashMap::new();
    let mut artists = HashMap::new();

    for (index, entry) in snapshot.entries.iter().enumerate() {
        let track = &entry.track;
        let Some(id) = track.id.as_deref().filter(|id| !id.is_empty()) else {
            debug!(index, name = %track.name, "skipping track without id");
            result.skipped_tracks += 1;
            continue;
        };

        if !seen.insert(id) {
            result.duplicates.push(track.name.clone());
        }

        let enriched = features
            .get(id)
            .copied()
            .unwrap_or_else(EnrichedFeatures::defaulted);
        if enriched.source == FeatureSource::Defaulted {
            result.defaulted_features += 1;
        }

        let release_date = track
            .album
            .as_ref()
            .and_then(|a| a.release_date.clone())
            .unwrap_or_default();

        *popularity
            .entry(popularity_bucket(track.popularity))
            .or_insert(0) += 1;
        if let Some(decade) = utils::release_year(&release_date).map(|y| y / 10 * 10) {
            *decades.entry(decade.to_string()).or_insert(0) += 1;
        }
        if let Some(bucket) = energy_bucket(enriched.features.energy) {
            *energy.entry(bucket).or_insert(0) += 1;
        }
        for artist in &track.artists {
            *artists.entry(artist.name.clone()).or_insert(0) += 1;
        }

        let played = last_played.get(id).copied();
        if played.is_some() {
            result.played_tracks += 1;
        } else {
            result.inactive_tracks += 1;
        }

        result.total_duration_ms += track.duration_ms;
        if track.explicit {
            result.explicit_tracks += 1;
        }
        if track.preview_url.is_some() {
            result.preview_available += 1;
        }

        result.tracks.push(Track {
            id: id.to_string(),
            name: track.name.clone(),
            artists: track.artists.iter().map(|a| a.name.clone()).collect(),
            album: track
                .album
                .as_ref()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            release_date,
            added_at: entry.added_at.clone(),
            popularity: track.popularity,
            duration_ms: track.duration_ms,
            explicit: track.explicit,
            preview_url: track.preview_url.clone(),
            features: enriched.features,
            feature_source: enriched.source,
            last_played: played,
        });
    }

    result.popularity_distribution = sorted_distribution(popularity);
    result.decade_distribution = sorted_distribution(decades);
    result.energy_distribution = sorted_distribution(energy);
    result.artist_distribution = sorted_distribution(artists);

    let count = result.tracks.len();
    result.analyzed_tracks = count;
    if count > 0 {
        let n = count as f64;
        let mean = |f: fn(&Track) -> f64| result.tracks.iter().map(f).sum::<f64>() / n;

        result.average_popularity = mean(|t| t.popularity as f64);
        result.average_energy = mean(|t| t.features.energy);
        result.average_tempo = mean(|t| t.features.tempo);
        result.average_danceability = mean(|t| t.features.danceability);
        result.average_valence = mean(|t| t.features.valence);
        result.explicit_percentage = result.explicit_tracks as f64 / n * 100.0;
        result.preview_percentage = result.preview_available as f64 / n * 100.0;
        result.active_percentage = result.played_tracks as f64 / n * 100.0;
    }

    result
}

fn latest_plays(records: &[RecentPlayRecord]) -> HashMap<&str, DateTime<Utc>> {
    let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for record in records {
        latest
            .entry(record.track_id.as_str())
            .and_modify(|at| *at = (*at).max(record.played_at))
            .or_insert(record.played_at);
    }
    latest
}

fn popularity_bucket(popularity: u32) -> String {
    (popularity / 10 * 10).to_string()
}

/// Tenths of the 0-1 energy scale, labelled by their lower bound. Energy 1.0
/// falls into the top bucket.
fn energy_bucket(energy: f64) -> Option<String> {
    if !energy.is_finite() {
        return None;
    }
    let tenth = (energy * 10.0).floor().clamp(0.0, 9.0) as u32;
    Some(format!("0.{}", tenth))
}

fn sorted_distribution(counts: HashMap<String, usize>) -> Vec<DistributionBucket> {
    let mut buckets: Vec<DistributionBucket> = counts
        .into_iter()
        .map(|(label, count)| DistributionBucket { label, count })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_buckets_are_clamped() {
        assert_eq!(energy_bucket(0.0).as_deref(), Some("0.0"));
        assert_eq!(energy_bucket(0.37).as_deref(), Some("0.3"));
        assert_eq!(energy_bucket(1.0).as_deref(), Some("0.9"));
        assert_eq!(energy_bucket(-0.2).as_deref(), Some("0.0"));
        assert_eq!(energy_bucket(f64::NAN), None);
    }

    #[test]
    fn popularity_buckets() {
        assert_eq!(popularity_bucket(0), "0");
        assert_eq!(popularity_bucket(39), "30");
        assert_eq!(popularity_bucket(100), "100");
    }

    #[test]
    fn distribution_ties_sort_by_label() {
        let counts = HashMap::from([
            ("b".to_string(), 2),
            ("a".to_string(), 2),
            ("c".to_string(), 5),
        ]);
        let labels: Vec<_> = sorted_distribution(counts)
            .into_iter()
            .map(|b| b.label)
            .collect();
        assert_eq!(labels, ["c", "a", "b"]);
    }
}
