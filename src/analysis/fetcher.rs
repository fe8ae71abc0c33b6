//! Reads playlists and listening history from Spotify.
//!
//! Both fetches follow the page cursors Spotify hands out. A cursor that was
//! already followed ends the walk, so a looping upstream cannot keep a
//! request busy.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    error::Result,
    spotify::AuthorizedClient,
    types::{PlaylistEntry, PlaylistSnapshot, RecentPlayRecord},
    utils,
};

/// Reads playlist metadata and then every page of entries.
///
/// A failing page aborts the whole fetch; a partial snapshot is never
/// returned. Entries without a track object are dropped.
pub async fn fetch_playlist(
    client: &AuthorizedClient<'_>,
    playlist_id: &str,
) -> Result<PlaylistSnapshot> {
    utils::validate_playlist_id(playlist_id)?;

    let info = client.playlist(playlist_id).await?;
    let mut entries = Vec::with_capacity(info.track_total as usize);
    let mut cursor: Option<String> = None;
    let mut visited = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = client
            .playlist_tracks(playlist_id, cursor.as_deref())
            .await?;
        pages += 1;

        for item in page.items {
            match item.track {
                Some(track) => entries.push(PlaylistEntry {
                    added_at: item.added_at,
                    track,
                }),
                None => debug!(playlist = %playlist_id, "dropping entry without a track"),
            }
        }

        match page.next {
            Some(next) if !visited.insert(next.clone()) => {
                warn!(playlist = %playlist_id, %next, "page cursor repeated, stopping");
                break;
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(
        playlist = %playlist_id,
        entries = entries.len(),
        pages,
        "fetched playlist"
    );

    Ok(PlaylistSnapshot {
        id: info.id,
        name: info.name,
        track_count: info.track_total,
        entries,
    })
}

/// Up to `limit` of the user's most recent plays, newest first.
pub async fn fetch_recent_plays(
    client: &AuthorizedClient<'_>,
    limit: usize,
) -> Result<Vec<RecentPlayRecord>> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut visited = HashSet::new();

    while records.len() < limit {
        let page_size = (limit - records.len()).min(50) as u32;
        let page = client.recently_played(cursor.as_deref(), page_size).await?;
        if page.items.is_empty() {
            break;
        }

        records.extend(page.items.into_iter().filter_map(|item| {
            item.track
                .id
                .filter(|id| !id.is_empty())
                .map(|track_id| RecentPlayRecord {
                    track_id,
                    played_at: item.played_at,
                })
        }));

        match page.next {
            Some(next) if !visited.insert(next.clone()) => {
                warn!(%next, "recent plays cursor repeated, stopping");
                break;
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    records.truncate(limit);
    debug!(count = records.len(), "fetched recent plays");
    Ok(records)
}
