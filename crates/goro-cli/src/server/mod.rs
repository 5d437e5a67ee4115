//! HTTP server module for `goroprof serve`.
//!
//! Serves a REST API over the loaded taxonomy and watches the configured
//! paths, rescanning on change.

pub mod api;
pub mod state;
mod watcher;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use state::{AppState, ServerConfig};

/// Runs the HTTP server. Blocks until shut down (Ctrl+C).
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let port = config.port;
    let state = Arc::new(AppState::new(config).await?);

    let watcher_state = Arc::clone(&state);
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watcher::start_watcher(watcher_state).await {
            eprintln!("goroprof: watcher error: {e}");
        }
    });

    let app = build_router(state, port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    println!("goroprof: server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    watcher_handle.abort();
    println!("\ngoroprof: server stopped");

    Ok(())
}

/// Builds the router: the API mounted at `/api`, CORS restricted to the
/// server's own origin (it binds to localhost only, but without this any
/// page open in the user's browser could otherwise read their goroutine
/// dumps over `http://127.0.0.1:<port>`).
pub fn build_router(state: Arc<AppState>, port: u16) -> Router {
    let allowed_origins = [
        format!("http://localhost:{port}").parse().unwrap(),
        format!("http://127.0.0.1:{port}").parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new().nest("/api", api::api_routes()).with_state(state).layer(cors)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
}
