//! Integration tests for serve mode's REST API, driven through the router
//! with `tower::ServiceExt::oneshot` rather than a bound TCP listener.

#![cfg(feature = "serve")]

use std::io::Write;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use goro_cli::server::{build_router, AppState, ServerConfig};
use goro_core::RawSettings;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

fn test_config(paths: Vec<std::path::PathBuf>) -> ServerConfig {
    let raw_settings = RawSettings::default();
    let archive_pattern = regex::Regex::new(&raw_settings.archive_path_pattern).unwrap();
    ServerConfig {
        paths,
        port: 0,
        raw_settings,
        archive_pattern,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_returns_ok_status() {
    let state = Arc::new(AppState::new(test_config(vec![])).await.unwrap());
    let app = build_router(state, 0);

    let response = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn collection_reflects_loaded_dump() {
    let mut file = NamedTempFile::with_suffix(".txt").unwrap();
    writeln!(file, "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10").unwrap();

    let state = Arc::new(AppState::new(test_config(vec![file.path().to_path_buf()])).await.unwrap());
    let app = build_router(state, 0);

    let response = app
        .oneshot(Request::get("/api/collection").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["categories"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn filter_endpoint_updates_match_counts() {
    let mut file = NamedTempFile::with_suffix(".txt").unwrap();
    writeln!(file, "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10").unwrap();

    let state = Arc::new(AppState::new(test_config(vec![file.path().to_path_buf()])).await.unwrap());
    let app = build_router(state, 0);

    let response = app
        .oneshot(
            Request::post("/api/filter")
                .header("content-type", "application/json")
                .body(Body::from(json!({"text": "doesnotmatch"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["matching_goroutines"], 0);
}

#[tokio::test]
async fn filter_endpoint_rejects_malformed_predicate() {
    let state = Arc::new(AppState::new(test_config(vec![])).await.unwrap());
    let app = build_router(state, 0);

    let response = app
        .oneshot(
            Request::post("/api/filter")
                .header("content-type", "application/json")
                .body(Body::from(json!({"text": "wait:not-a-number"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn remove_file_drops_its_goroutines() {
    let mut file = NamedTempFile::with_suffix(".txt").unwrap();
    writeln!(file, "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10").unwrap();
    let name = file.path().file_name().unwrap().to_string_lossy().to_string();

    let state = Arc::new(AppState::new(test_config(vec![file.path().to_path_buf()])).await.unwrap());
    let app = build_router(state, 0);

    let response = app
        .oneshot(
            Request::delete(format!("/api/files/{name}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn pin_category_toggles_on() {
    let mut file = NamedTempFile::with_suffix(".txt").unwrap();
    writeln!(file, "goroutine 1 [running]:\nmain.worker()\n\t/main.go:10").unwrap();

    let state = Arc::new(AppState::new(test_config(vec![file.path().to_path_buf()])).await.unwrap());
    let app = build_router(state, 0);

    let response = app
        .oneshot(Request::post("/api/pin/category/0").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
