//! REST API handlers for serve mode: the collection's own operations
//! exposed over HTTP (listing, filter, pin, add/remove file).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::AppState;

/// Build the API router with all endpoints.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/collection", get(collection))
        .route("/files", get(files).post(add_file))
        .route("/files/{name}", delete(remove_file))
        .route("/filter", post(set_filter))
        .route("/pin/category/{id}", post(pin_category))
        .route("/pin/category/{id}/with-children", post(pin_category_with_children))
        .route("/pin/stack/{idx}", post(pin_stack))
        .route("/pin/stack/{idx}/with-children", post(pin_stack_with_children))
        .route("/pin/group/{stack_idx}/{section_id}/{group_id}", post(pin_group))
        .route(
            "/pin/group/{stack_idx}/{section_id}/{group_id}/with-children",
            post(pin_group_with_children),
        )
        .route("/pin/goroutine/{id}", post(pin_goroutine))
        .route("/pin/unpin-all", post(unpin_all))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct FilterRequest {
    text: String,
}

#[derive(Deserialize)]
struct AddFileRequest {
    name: String,
    content: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/collection - full nested taxonomy snapshot.
async fn collection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let collection = state.collection.lock().await;
    Json(crate::output::json::collection_snapshot(&collection))
}

/// GET /api/files - per-file totals.
async fn files(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let collection = state.collection.lock().await;
    Json(collection.file_statistics())
}

/// POST /api/files - add a file directly (outside of the watched paths).
async fn add_file(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddFileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut collection = state.collection.lock().await;
    let patterns = collection.settings().name_extraction_patterns.clone();
    let parsed = goro_core::parse_file(&payload.content, &payload.name, &patterns)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    collection
        .add_file(parsed, Some(payload.name))
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    Ok(StatusCode::CREATED)
}

/// DELETE /api/files/:name - remove a loaded file.
async fn remove_file(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.remove_file(&name);
    StatusCode::NO_CONTENT
}

/// POST /api/filter - apply a filter string, returns updated stack stats.
async fn set_filter(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FilterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let filter = goro_core::Filter::parse(&payload.text).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let mut collection = state.collection.lock().await;
    collection.set_filter(filter);
    Ok(Json(collection.stack_statistics()))
}

async fn pin_category(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.toggle_category_pin(id);
    StatusCode::NO_CONTENT
}

async fn pin_category_with_children(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.toggle_category_pin_with_children(id);
    StatusCode::NO_CONTENT
}

async fn pin_stack(State(state): State<Arc<AppState>>, Path(idx): Path<usize>) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.toggle_stack_pin(idx);
    StatusCode::NO_CONTENT
}

async fn pin_stack_with_children(State(state): State<Arc<AppState>>, Path(idx): Path<usize>) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.toggle_stack_pin_with_children(idx);
    StatusCode::NO_CONTENT
}

async fn pin_group(
    State(state): State<Arc<AppState>>,
    Path((stack_idx, section_id, group_id)): Path<(usize, usize, usize)>,
) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.toggle_group_pin(stack_idx, section_id, group_id);
    StatusCode::NO_CONTENT
}

async fn pin_group_with_children(
    State(state): State<Arc<AppState>>,
    Path((stack_idx, section_id, group_id)): Path<(usize, usize, usize)>,
) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.toggle_group_pin_with_children(stack_idx, section_id, group_id);
    StatusCode::NO_CONTENT
}

async fn pin_goroutine(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.toggle_goroutine_pin(&id);
    StatusCode::NO_CONTENT
}

async fn unpin_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut collection = state.collection.lock().await;
    collection.unpin_all_items();
    StatusCode::NO_CONTENT
}
