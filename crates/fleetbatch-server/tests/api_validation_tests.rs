//! Route-level tests for request validation and error mapping.
//!
//! These paths reject bad input before the job queue or database is touched,
//! so a lazy (never-connected) pool is enough.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

use fleetbatch_server::api::{create_router, AppState};
use fleetbatch_server::cache::ArtifactCache;
use fleetbatch_server::config::Config;
use fleetbatch_server::jobs::JobQueue;
use fleetbatch_server::notify::NotificationHub;

fn test_router() -> Router {
    let config = Config::default();
    let db = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .unwrap();

    create_router(AppState {
        queue: JobQueue::new(db),
        cache: ArtifactCache::new(),
        hub: NotificationHub::new(8),
        config: Arc::new(config),
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds_ok() {
    let response = test_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn root_reports_service_name() {
    let response = test_router()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "FleetBatch Server");
}

#[tokio::test]
async fn negative_export_age_is_rejected_before_queueing() {
    let request = Request::post("/batch/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"min_age": -5}"#))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn import_without_file_field_is_rejected() {
    let boundary = "test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
         not a file\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::post("/batch/import")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn empty_import_file_is_rejected() {
    let boundary = "test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"empty.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         \r\n\
         --{boundary}--\r\n"
    );
    let request = Request::post("/batch/import")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn download_of_unknown_artifact_is_not_found() {
    let url = format!("/batch/download/{}", Uuid::new_v4());
    let response = test_router()
        .oneshot(Request::get(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn cached_artifact_download_sets_csv_headers() {
    let config = Config::default();
    let db = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .unwrap();
    let cache = ArtifactCache::new();
    let job_id = Uuid::new_v4();
    cache
        .put(
            job_id,
            "id,vin\n1,VIN001\n".to_string(),
            std::time::Duration::from_secs(60),
        )
        .await;

    let app = create_router(AppState {
        queue: JobQueue::new(db),
        cache,
        hub: NotificationHub::new(8),
        config: Arc::new(config),
    });

    let url = format!("/batch/download/{}", job_id);
    let response = app
        .oneshot(Request::get(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        disposition,
        format!("attachment; filename=\"vehicle_export_{job_id}.csv\"")
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"id,vin\n1,VIN001\n");
}
