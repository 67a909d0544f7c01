pub mod health;
pub mod projects;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /projects?owner_id=                 history listing
/// /projects/active?owner_id=          dashboard "active jobs"
/// /projects/{id}/summary              project summary
/// /projects/{id}/summary/stream       live summary (server-sent events)
/// /projects/{id}/combine              start (POST), snapshot (GET), cancel (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/projects", projects::router())
}
