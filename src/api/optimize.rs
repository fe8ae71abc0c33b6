use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;

use crate::{
    api::{ApiResponse, ApiResult, session::AuthSession},
    error::AppError,
    management::TaskStatus,
    server::AppState,
    types::{OptimizationCriteria, OptimizationOutcome},
    utils,
};

fn criteria_from(
    body: Result<Json<OptimizationCriteria>, JsonRejection>,
) -> Result<OptimizationCriteria, AppError> {
    let Json(criteria) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    criteria.validate()?;
    Ok(criteria)
}

pub async fn optimize(
    State(state): State<AppState>,
    session: AuthSession,
    Path(playlist_id): Path<String>,
    body: Result<Json<OptimizationCriteria>, JsonRejection>,
) -> ApiResult<OptimizationOutcome> {
    let criteria = criteria_from(body)?;
    Ok(ApiResponse(
        state
            .pipeline
            .optimize(&session.credentials, &playlist_id, criteria)
            .await?,
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub task_id: String,
}

/// Runs the optimization in the background and answers `202` right away.
pub async fn submit_optimize(
    State(state): State<AppState>,
    session: AuthSession,
    Path(playlist_id): Path<String>,
    body: Result<Json<OptimizationCriteria>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<TaskCreated>), AppError> {
    let criteria = criteria_from(body)?;
    utils::validate_playlist_id(&playlist_id)?;

    let pipeline = state.pipeline.clone();
    let credentials = session.credentials;
    let task_id = state
        .tasks
        .submit(&session.id, async move {
            pipeline
                .optimize(&credentials, &playlist_id, criteria)
                .await
        })
        .await;

    Ok((StatusCode::ACCEPTED, ApiResponse(TaskCreated { task_id })))
}

pub async fn task_status(
    State(state): State<AppState>,
    session: AuthSession,
    Path(task_id): Path<String>,
) -> ApiResult<TaskStatus> {
    state
        .tasks
        .status(&session.id, &task_id)
        .await
        .map(ApiResponse)
        .ok_or_else(|| AppError::NotFound(format!("task {}", task_id)))
}
