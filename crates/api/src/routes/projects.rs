//! Route definitions for the `/projects` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{combine, projects};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                 -> list_projects
/// GET    /active           -> list_active
/// GET    /{id}/summary     -> get_summary
/// GET    /{id}/summary/stream -> stream_summary (SSE)
/// POST   /{id}/combine     -> start_combine
/// GET    /{id}/combine     -> get_combine
/// DELETE /{id}/combine     -> cancel_combine
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(projects::list_projects))
        .route("/active", get(projects::list_active))
        .route("/{id}/summary", get(projects::get_summary))
        .route("/{id}/summary/stream", get(projects::stream_summary))
        .route(
            "/{id}/combine",
            get(combine::get_combine)
                .post(combine::start_combine)
                .delete(combine::cancel_combine),
        )
}
