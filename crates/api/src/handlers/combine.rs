//! Handlers for a project's combine job.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use montage_core::combine::{CombineOptions, DEFAULT_BACKGROUND_AUDIO_VOLUME};
use montage_core::combine_job::CombineJob;
use montage_core::error::CoreError;
use montage_core::types::DbId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for starting a combine job.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StartCombine {
    #[validate(url)]
    pub background_audio_url: Option<String>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub background_audio_volume: Option<f32>,
}

impl From<StartCombine> for CombineOptions {
    fn from(input: StartCombine) -> Self {
        Self {
            background_audio_url: input.background_audio_url,
            background_audio_volume: input
                .background_audio_volume
                .unwrap_or(DEFAULT_BACKGROUND_AUDIO_VOLUME),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CombineStarted {
    pub job_id: String,
}

/// POST /api/v1/projects/{id}/combine
///
/// Submit the project's completed video segments for combination.
/// Returns 202 with the upstream job id; progress is read from
/// `GET /projects/{id}/combine`.
pub async fn start_combine(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<StartCombine>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let job_id = state
        .combines
        .submit_for_project(project_id, input.into())
        .await?;

    tracing::info!(project_id, job_id = %job_id, "Combine requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: CombineStarted { job_id },
        }),
    ))
}

/// GET /api/v1/projects/{id}/combine
///
/// Latest snapshot of the current or last combine job.
pub async fn get_combine(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<CombineJob>>> {
    let job = state
        .combines
        .job(project_id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "combine job",
            id: project_id,
        }))?;
    Ok(Json(DataResponse { data: job }))
}

/// DELETE /api/v1/projects/{id}/combine
///
/// Stop tracking the project's combine job. The upstream job is not
/// cancelled.
pub async fn cancel_combine(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<StatusCode> {
    let job = state.combines.cancel(project_id).await?;
    tracing::info!(project_id, job_id = %job.job_id, state = ?job.state, "Combine cancelled");
    Ok(StatusCode::NO_CONTENT)
}
