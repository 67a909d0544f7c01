#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use montage_core::segment::{SegmentKind, SegmentStatus};
use montage_core::types::DbId;
use montage_engine::testing::{segment, InMemoryStore, ScriptedCombineService};
use montage_engine::EngineConfig;
use montage_events::EventBus;
use serde_json::Value;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use montage_api::config::ServerConfig;
use montage_api::routes;
use montage_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: "postgres://unused".to_string(),
        combine_service_url: "http://combine.test".to_string(),
        combine_api_key: None,
        engine: EngineConfig::default(),
    }
}

/// Wire the engine over in-memory collaborators.
pub fn test_state(store: Arc<InMemoryStore>, service: Arc<ScriptedCombineService>) -> AppState {
    AppState::new(test_config(), store, service, Arc::new(EventBus::default()))
}

/// Build the application router with the same middleware stack `main.rs`
/// installs.
pub fn build_test_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// A project owned by `owner_id` with `count` video segments in `status`,
/// all updated just now.
pub fn seed_videos(store: &InMemoryStore, project_id: DbId, owner_id: DbId, count: DbId, status: SegmentStatus) {
    store.add_project(project_id, owner_id);
    for n in 1..=count {
        store.upsert_segment(segment(
            project_id * 100 + n,
            project_id,
            SegmentKind::Video,
            status,
            Utc::now(),
        ));
    }
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Body::from(body.to_string())).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, Body::empty()).await
}

async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
