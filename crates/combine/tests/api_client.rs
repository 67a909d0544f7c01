//! Exercises [`CombineApi`] against a local axum stand-in for the service.

use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use montage_combine::{CombineApi, CombineApiError};
use montage_core::combine::{CombineClip, CombineOptions, CombineRequest};
use montage_core::combine_job::ReportedStatus;
use montage_core::store::{CombineService, CombineServiceError};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const KEY: &str = "secret";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some(KEY)
}

fn fake_service() -> Router {
    Router::new()
        .route(
            "/api/combine-final-video",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if !authorized(&headers) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid API key"})));
                }
                let count = body["segments"].as_array().map(Vec::len).unwrap_or(0);
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "data": {"job_id": format!("job_{count}"), "status": "processing"}
                    })),
                )
            }),
        )
        .route(
            "/api/job-status/{job_id}",
            get(|headers: HeaderMap, Path(job_id): Path<String>| async move {
                if !authorized(&headers) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid API key"})));
                }
                if job_id == "missing" {
                    return (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"})));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "data": {
                            "job_id": job_id,
                            "status": "completed",
                            "progress_percentage": 100,
                            "current_step": "Completed",
                            "final_video_url": "https://cdn.test/final.mp4"
                        }
                    })),
                )
            }),
        )
}

fn client(base_url: impl Into<String>, api_key: Option<String>) -> CombineApi {
    CombineApi::new(base_url, api_key, Duration::from_secs(5)).unwrap()
}

fn request() -> CombineRequest {
    CombineRequest {
        project_id: 5,
        clips: (1..=3)
            .map(|id| CombineClip {
                segment_id: id,
                label: "SEGMENT".into(),
                artifact_url: format!("https://cdn.test/{id}.mp4"),
                duration_secs: 8.0,
            })
            .collect(),
        options: CombineOptions::default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_job_id() {
    let base = serve(fake_service()).await;
    let api = client(format!("{base}/"), Some(KEY.into()));

    let job_id = api.submit(&request()).await.unwrap();
    assert_eq!(job_id, "job_3");
}

#[tokio::test]
async fn status_maps_into_report() {
    let base = serve(fake_service()).await;
    let api = client(base, Some(KEY.into()));

    let report = api.status("job_3").await.unwrap();
    assert_eq!(report.status, ReportedStatus::Completed);
    assert_eq!(report.final_url.as_deref(), Some("https://cdn.test/final.mp4"));
}

#[tokio::test]
async fn missing_api_key_is_rejected_with_body() {
    let base = serve(fake_service()).await;
    let api = client(base, None);

    let err = api.submit(&request()).await.unwrap_err();
    assert_matches!(err, CombineServiceError::Rejected { status: 401, ref body } if body.contains("Invalid API key"));
}

#[tokio::test]
async fn unknown_job_surfaces_status_code() {
    let base = serve(fake_service()).await;
    let api = client(base, Some(KEY.into()));

    assert_matches!(
        api.job_status("missing").await,
        Err(CombineApiError::ApiError { status: 404, .. })
    );
}

#[tokio::test]
async fn unsuccessful_envelope_is_a_protocol_error() {
    let router = Router::new().route(
        "/api/combine-final-video",
        post(|| async { Json(json!({"success": false, "data": null})) }),
    );
    let base = serve(router).await;
    let api = client(base, None);

    assert_matches!(api.submit(&request()).await, Err(CombineServiceError::Protocol(_)));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let api = client("http://127.0.0.1:1", None);
    assert_matches!(api.status("job_1").await, Err(CombineServiceError::Transport(_)));
}

#[tokio::test]
async fn stalled_submit_gives_up_after_the_timeout() {
    let router = Router::new().route(
        "/api/combine-final-video",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(json!({"success": true, "data": {"job_id": "late"}}))
        }),
    );
    let base = serve(router).await;
    let api = CombineApi::new(base, None, Duration::from_millis(200)).unwrap();

    let started = std::time::Instant::now();
    let err = api.submit(&request()).await.unwrap_err();
    assert_matches!(err, CombineServiceError::Transport(_));
    assert!(started.elapsed() < Duration::from_secs(5));
}
