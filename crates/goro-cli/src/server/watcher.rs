//! File system watcher for the paths passed to `goroprof serve`.
//!
//! Watches the configured paths for changes and triggers a rescan of the
//! application state when something moves.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};

use super::AppState;

/// Debounce duration for file system events (100ms).
///
/// Groups rapid file changes (e.g. a dump being rewritten in place) into a
/// single rescan.
const DEBOUNCE_DURATION: Duration = Duration::from_millis(100);

/// Starts watching `state.config.paths` for changes. Runs until cancelled;
/// each batch of events triggers one [`AppState::rescan`].
pub async fn start_watcher(state: Arc<AppState>) -> Result<()> {
    let paths = state.config.paths.clone();
    if paths.is_empty() {
        return Ok(());
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);

    let mut debouncer = new_debouncer(DEBOUNCE_DURATION, move |result| {
        if let Err(e) = tx.blocking_send(result) {
            eprintln!("goroprof: warning: failed to send file event: {e}");
        }
    })
    .map_err(|e| anyhow::anyhow!("Failed to create file watcher: {e}"))?;

    for path in &paths {
        if path.exists() {
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            debouncer
                .watcher()
                .watch(path, mode)
                .map_err(|e| anyhow::anyhow!("Failed to watch {}: {e}", path.display()))?;
            println!("goroprof: watching {}", path.display());
        }
    }

    while let Some(result) = rx.recv().await {
        match result {
            Ok(events) if events.is_empty() => {}
            Ok(_) => {
                if let Err(e) = state.rescan().await {
                    eprintln!("goroprof: failed to rescan: {e}");
                }
            }
            Err(error) => {
                eprintln!("goroprof: watcher error: {error}");
            }
        }
    }

    Ok(())
}
