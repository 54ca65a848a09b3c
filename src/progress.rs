//! UI-agnostic progress reporting.
//!
//! The crawler emits [`ProgressUpdate`]s through a [`ProgressSink`]. The
//! library ships a tracing-backed sink; front ends supply their own (the
//! binary drives an `indicatif` spinner).

use std::sync::Mutex;

use tracing::info;

/// Status line emitted after each crawled page.
#[must_use]
pub fn pages_evaluated(pages: u64) -> String {
    format!("Evaluated {pages} result pages...")
}

/// Status line emitted before duplicate resolution.
pub const CALCULATING_UNIQUE: &str = "Calculating unique downloads, removing duplicates...";

/// Status line for a chain-scoped timeout.
#[must_use]
pub fn page_timed_out(page: u32) -> String {
    format!("Timeout while crawling result page {page}, skipping its remaining pages")
}

/// One progress message, optionally carrying the pages-crawled counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Human-readable status text; empty clears the status line.
    pub message: String,
    pub pages_crawled: Option<u64>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pages_crawled: None,
        }
    }

    #[must_use]
    pub fn pages(pages: u64) -> Self {
        Self {
            message: pages_evaluated(pages),
            pages_crawled: Some(pages),
        }
    }

    #[must_use]
    pub fn clear() -> Self {
        Self::message("")
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.message.is_empty()
    }
}

/// Receives progress updates from any crawl chain.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, update: ProgressUpdate) {
        if update.is_clear() {
            return;
        }
        match update.pages_crawled {
            Some(pages) => info!(pages, "{}", update.message),
            None => info!("{}", update.message),
        }
    }
}

/// Keeps every update in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        match self.updates.lock() {
            Ok(updates) => updates.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, update: ProgressUpdate) {
        match self.updates.lock() {
            Ok(mut updates) => updates.push(update),
            Err(poisoned) => poisoned.into_inner().push(update),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_update_carries_counter() {
        let update = ProgressUpdate::pages(4);
        assert_eq!(update.pages_crawled, Some(4));
        assert_eq!(update.message, "Evaluated 4 result pages...");
    }

    #[test]
    fn test_clear_update_is_empty() {
        assert!(ProgressUpdate::clear().is_clear());
        assert!(!ProgressUpdate::message(CALCULATING_UNIQUE).is_clear());
    }

    #[test]
    fn test_recording_progress_keeps_order() {
        let sink = RecordingProgress::new();
        sink.report(ProgressUpdate::pages(1));
        sink.report(ProgressUpdate::clear());
        let updates = sink.updates();
        assert_eq!(updates.len(), 2);
        assert!(updates[1].is_clear());
    }
}
