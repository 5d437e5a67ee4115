//! Shared application state for the server.
//!
//! Holds the single [`ProfileCollection`] behind a `tokio::sync::Mutex`: the
//! core itself is single-threaded cooperative, so the async server layer
//! serializes every request into that single writer rather than the core
//! taking any lock of its own.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use goro_core::{ProfileCollection, RawSettings};
use regex::Regex;
use tokio::sync::Mutex;

use crate::input::read_sources;
use crate::settings::{compile_settings, load_one};

/// Server configuration derived from CLI arguments.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub paths: Vec<PathBuf>,
    pub port: u16,
    pub raw_settings: RawSettings,
    pub archive_pattern: Regex,
}

/// Shared application state: the collection plus enough bookkeeping to
/// diff a rescan against what is already loaded.
pub struct AppState {
    pub config: ServerConfig,
    pub collection: Mutex<ProfileCollection>,
    /// display name -> last-seen content, for change detection on rescan.
    loaded: Mutex<HashMap<String, String>>,
}

impl AppState {
    /// Creates new application state, performing the initial scan and
    /// parse of `config.paths` on a blocking thread (parsing is CPU-bound).
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let paths = config.paths.clone();
        let archive_pattern = config.archive_pattern.clone();
        let sources = tokio::task::spawn_blocking(move || read_sources(&paths, &archive_pattern))
            .await
            .context("scan task was cancelled")??;

        let settings = compile_settings(&config.raw_settings);
        let mut collection = ProfileCollection::with_settings(settings);
        let mut loaded = HashMap::new();
        for source in sources {
            loaded.insert(source.name.clone(), source.content.clone());
            load_one(&mut collection, source);
        }

        println!("goroprof: loaded {} file(s)", loaded.len());

        Ok(Self {
            config,
            collection: Mutex::new(collection),
            loaded: Mutex::new(loaded),
        })
    }

    /// Rescans `config.paths`, adding new files, removing vanished ones,
    /// and re-ingesting files whose content changed. Each structural change
    /// is applied as its own atomic `add_file`/`remove_file` call.
    pub async fn rescan(&self) -> Result<()> {
        let paths = self.config.paths.clone();
        let archive_pattern = self.config.archive_pattern.clone();
        let sources = tokio::task::spawn_blocking(move || read_sources(&paths, &archive_pattern))
            .await
            .context("scan task was cancelled")??;

        let mut loaded = self.loaded.lock().await;
        let mut collection = self.collection.lock().await;

        let mut seen = std::collections::HashSet::new();
        let mut changed = 0usize;

        for source in sources {
            seen.insert(source.name.clone());
            let unchanged = loaded.get(&source.name) == Some(&source.content);
            if unchanged {
                continue;
            }
            if loaded.contains_key(&source.name) {
                collection.remove_file(&source.name);
            }
            loaded.insert(source.name.clone(), source.content.clone());
            load_one(&mut collection, source);
            changed += 1;
        }

        let removed: Vec<String> = loaded.keys().filter(|name| !seen.contains(*name)).cloned().collect();
        for name in &removed {
            collection.remove_file(name);
            loaded.remove(name);
            changed += 1;
        }

        if changed > 0 {
            println!("goroprof: rescan applied {changed} file change(s)");
        }
        Ok(())
    }
}
