//! Handlers for project listings and summaries.
//!
//! There is no authentication layer; the owner is an explicit query
//! parameter.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use montage_core::types::DbId;
use montage_engine::{ProjectOverview, ProjectWatcher};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for the owner-scoped listings.
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: DbId,
}

/// GET /api/v1/projects?owner_id=
///
/// Every project of the owner, most recently updated first.
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> AppResult<Json<DataResponse<Vec<ProjectOverview>>>> {
    let projects = state.summaries.history(query.owner_id).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/active?owner_id=
///
/// Projects the dashboard shows as active jobs.
pub async fn list_active(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> AppResult<Json<DataResponse<Vec<ProjectOverview>>>> {
    let projects = state.summaries.active(query.owner_id).await?;
    tracing::debug!(owner_id = query.owner_id, count = projects.len(), "Active projects listed");
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProjectOverview>>> {
    let overview = state.summaries.project_summary(project_id).await?;
    Ok(Json(DataResponse { data: overview }))
}

/// GET /api/v1/projects/{id}/summary/stream
///
/// Server-sent events: a `summary` event carrying the overview whenever it
/// changes, then a final `removed` event if the project disappears. The
/// watcher stops when the client disconnects.
pub async fn stream_summary(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    // Unknown projects are a plain 404, not an empty stream.
    state.summaries.project_summary(project_id).await?;

    let cancel = CancellationToken::new();
    let watcher = ProjectWatcher::spawn(
        project_id,
        Arc::clone(&state.summaries),
        &state.event_bus,
        state.config.engine.summary_refresh,
        cancel.clone(),
    );
    tracing::debug!(project_id, "Summary stream opened");

    let open = Some((watcher.summary, cancel.drop_guard()));
    let stream = stream::unfold(open, move |open| async move {
        let (mut summary, guard) = open?;
        summary.changed().await.ok()?;
        let current = summary.borrow_and_update().clone();
        match current {
            Some(overview) => {
                let event = Event::default().event("summary").json_data(&overview);
                Some((event, Some((summary, guard))))
            }
            None => {
                let event = Event::default().event("removed").data(project_id.to_string());
                Some((Ok(event), None))
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
