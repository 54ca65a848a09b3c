//! Per-target session results and their persistence.
//!
//! [`SessionResult`] is produced once at the end of a crawl and handed to a
//! [`SessionStore`]. [`JsonSessionStore`] keeps one pretty-printed JSON file
//! per target; the previous result is loaded at session start so that a
//! cancelled run can carry the last completion timestamp forward.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::extract::MediaKind;
use crate::stats::DuplicateCounts;

/// Errors from loading or saving a [`SessionResult`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid session file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Final counts of one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub target: String,
    /// Discovered references minus duplicates.
    pub total_count: usize,
    pub duplicates: DuplicateCounts,
    /// Raw discovered count per kind, repeats included.
    #[serde(default)]
    pub discovered: BTreeMap<MediaKind, usize>,
    #[serde(default)]
    pub pages_crawled: u64,
    /// Set only by runs that finished without cancellation.
    #[serde(default)]
    pub last_complete_crawl: Option<DateTime<Utc>>,
}

impl SessionResult {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }
}

/// Persistence collaborator for session results.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the stored result for `target`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a stored result exists but cannot be read.
    async fn load(&self, target: &str) -> Result<Option<SessionResult>, StoreError>;

    /// Stores `result`, replacing any previous one for the same target.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the result cannot be written.
    async fn save(&self, result: &SessionResult) -> Result<(), StoreError>;
}

/// Stores each target's result in `<dir>/<target>.json`.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the session file for `target`.
    #[must_use]
    pub fn path_for(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{}.json", target_file_stem(target)))
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    #[instrument(skip(self))]
    async fn load(&self, target: &str) -> Result<Option<SessionResult>, StoreError> {
        let path = self.path_for(target);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no previous session file");
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Format { path, source })
    }

    #[instrument(skip(self, result), fields(target = %result.target))]
    async fn save(&self, result: &SessionResult) -> Result<(), StoreError> {
        let path = self.path_for(&result.target);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let json = serde_json::to_string_pretty(result).map_err(|source| StoreError::Format {
            path: path.clone(),
            source,
        })?;

        // Atomic replace.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "session result saved");
        Ok(())
    }
}

/// Keeps results in memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    results: Mutex<HashMap<String, SessionResult>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a stored result, as if a previous run had saved it.
    #[must_use]
    pub fn with_result(self, result: SessionResult) -> Self {
        self.lock().insert(result.target.clone(), result);
        self
    }

    /// Returns the stored result for `target`.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<SessionResult> {
        self.lock().get(target).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionResult>> {
        match self.results.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, target: &str) -> Result<Option<SessionResult>, StoreError> {
        Ok(self.get(target))
    }

    async fn save(&self, result: &SessionResult) -> Result<(), StoreError> {
        self.lock().insert(result.target.clone(), result.clone());
        Ok(())
    }
}

/// File-system-safe form of a target name.
#[must_use]
pub fn target_file_stem(target: &str) -> String {
    let name: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_matches('.');
    if name.is_empty() {
        "_".to_string()
    } else {
        name.to_string()
    }
}
