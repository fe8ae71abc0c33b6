//! Audio-feature enrichment.
//!
//! Spotify serves audio features for up to a hundred tracks per request;
//! the enricher batches ids, spaces the batches out and fills gaps with the
//! default feature record.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use tracing::{debug, warn};

use crate::{spotify::AuthorizedClient, types::EnrichedFeatures};

/// Looks up audio features in fixed-size batches.
///
/// Enrichment degrades instead of failing: a batch the client could not
/// fetch, or an id Spotify has no features for, gets the default record
/// tagged [`FeatureSource::Defaulted`](crate::types::FeatureSource).
#[derive(Debug, Clone, Copy)]
pub struct FeatureEnricher {
    batch_size: usize,
    batch_delay: Duration,
}

impl FeatureEnricher {
    /// A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Features for every distinct, non-empty id in `ids`.
    ///
    /// `batch_delay` is slept before every batch but the first.
    pub async fn enrich(
        &self,
        client: &AuthorizedClient<'_>,
        ids: &[String],
    ) -> HashMap<String, EnrichedFeatures> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut features = HashMap::with_capacity(unique.len());

        for (index, batch) in unique.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            match client.audio_features(batch).await {
                Ok(found) => {
                    let mut found = found.into_iter();
                    for id in batch {
                        let entry = match found.next().flatten() {
                            Some(f) => EnrichedFeatures::upstream(f),
                            None => {
                                debug!(track = %id, "no audio features, using defaults");
                                EnrichedFeatures::defaulted()
                            }
                        };
                        features.insert(id.clone(), entry);
                    }
                }
                Err(e) => {
                    warn!(
                        batch = index,
                        size = batch.len(),
                        error = %e,
                        "audio feature batch failed, using defaults"
                    );
                    for id in batch {
                        features.insert(id.clone(), EnrichedFeatures::defaulted());
                    }
                }
            }
        }

        features
    }
}
