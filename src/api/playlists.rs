use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{ApiResponse, ApiResult, session::AuthSession},
    error::AppError,
    server::AppState,
    types::{AnalysisResult, PlaylistChanges, PlaylistSummary, SimilarTrack, UserProfile},
};

pub async fn me(State(state): State<AppState>, session: AuthSession) -> ApiResult<UserProfile> {
    if let Some(profile) = session.profile {
        return Ok(ApiResponse(profile));
    }
    let profile = state.pipeline.profile(&session.credentials).await?;
    state
        .sessions
        .update(&session.id, |s| s.profile = Some(profile.clone()))
        .await;
    Ok(ApiResponse(profile))
}

pub async fn playlists(
    State(state): State<AppState>,
    session: AuthSession,
) -> ApiResult<Vec<PlaylistSummary>> {
    Ok(ApiResponse(
        state.pipeline.playlists(&session.credentials).await?,
    ))
}

pub async fn analyze(
    State(state): State<AppState>,
    session: AuthSession,
    Path(playlist_id): Path<String>,
) -> ApiResult<AnalysisResult> {
    Ok(ApiResponse(
        state
            .pipeline
            .analyze(&session.credentials, &playlist_id)
            .await?,
    ))
}

pub async fn changes(
    State(state): State<AppState>,
    session: AuthSession,
    Path(playlist_id): Path<String>,
) -> ApiResult<PlaylistChanges> {
    Ok(ApiResponse(
        state
            .pipeline
            .changes(&session.credentials, &playlist_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SimilarTracks {
    pub tracks: Vec<SimilarTrack>,
    pub total: usize,
}

pub async fn similar(
    State(state): State<AppState>,
    session: AuthSession,
    Path(playlist_id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> ApiResult<SimilarTracks> {
    let tracks = state
        .pipeline
        .similar(&session.credentials, &playlist_id, params.limit)
        .await?;
    Ok(ApiResponse(SimilarTracks {
        total: tracks.len(),
        tracks,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTracksBody {
    pub track_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedTracks {
    pub added_tracks: usize,
}

pub async fn add_similar(
    State(state): State<AppState>,
    session: AuthSession,
    Path(playlist_id): Path<String>,
    body: Result<Json<AddTracksBody>, JsonRejection>,
) -> ApiResult<AddedTracks> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let added_tracks = state
        .pipeline
        .add_tracks(&session.credentials, &playlist_id, &body.track_ids)
        .await?;
    Ok(ApiResponse(AddedTracks { added_tracks }))
}
