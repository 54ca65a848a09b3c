//! Discovery statistics and post-crawl duplicate accounting.
//!
//! The [`StatisticsTracker`] records every discovered reference per media kind,
//! repeats included, plus a pages-crawled counter. Chains append concurrently;
//! after the crawl stage joins, [`resolve_duplicates`] counts per kind how many
//! entries repeat an identity (source URL) already seen earlier in the list.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::{MediaKind, MediaReference};

/// Concurrent, append-only discovery record.
#[derive(Debug, Default)]
pub struct StatisticsTracker {
    discovered: DashMap<MediaKind, Vec<String>>,
    pages_crawled: AtomicU64,
}

impl StatisticsTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reference to its kind's list.
    pub fn record(&self, reference: &MediaReference) {
        self.discovered
            .entry(reference.kind)
            .or_default()
            .push(reference.url.clone());
    }

    /// Counts one more crawled page and returns the new total.
    pub fn increment_pages(&self) -> u64 {
        self.pages_crawled.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn pages_crawled(&self) -> u64 {
        self.pages_crawled.load(Ordering::SeqCst)
    }

    /// Number of references recorded for `kind`, repeats included.
    #[must_use]
    pub fn discovered(&self, kind: MediaKind) -> usize {
        self.discovered.get(&kind).map_or(0, |list| list.len())
    }

    /// Copies the current state for duplicate resolution.
    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let references = self
            .discovered
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        StatisticsSnapshot {
            references,
            pages_crawled: self.pages_crawled(),
        }
    }

    /// Drops the collected reference lists once they have been accounted for.
    pub fn clear_references(&self) {
        self.discovered.clear();
    }
}

/// Point-in-time copy of a [`StatisticsTracker`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub references: BTreeMap<MediaKind, Vec<String>>,
    pub pages_crawled: u64,
}

impl StatisticsSnapshot {
    /// All references of every kind, repeats included.
    #[must_use]
    pub fn total_discovered(&self) -> usize {
        self.references.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn discovered(&self, kind: MediaKind) -> usize {
        self.references.get(&kind).map_or(0, Vec::len)
    }
}

/// Per-kind duplicate counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCounts {
    pub photos: usize,
    pub videos: usize,
    pub audios: usize,
}

impl DuplicateCounts {
    #[must_use]
    pub fn get(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Photo => self.photos,
            MediaKind::Video => self.videos,
            MediaKind::Audio => self.audios,
        }
    }

    fn set(&mut self, kind: MediaKind, count: usize) {
        match kind {
            MediaKind::Photo => self.photos = count,
            MediaKind::Video => self.videos = count,
            MediaKind::Audio => self.audios = count,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.photos + self.videos + self.audios
    }
}

/// Counts entries whose URL already appeared earlier in the same kind's list.
///
/// Order within a list does not change the result: a URL seen `n` times
/// contributes `n - 1`.
#[must_use]
pub fn resolve_duplicates(snapshot: &StatisticsSnapshot) -> DuplicateCounts {
    let mut counts = DuplicateCounts::default();

    for kind in MediaKind::ALL {
        let Some(list) = snapshot.references.get(&kind) else {
            continue;
        };
        let mut seen = HashSet::with_capacity(list.len());
        let duplicates = list.iter().filter(|url| !seen.insert(url.as_str())).count();
        counts.set(kind, duplicates);
    }

    debug!(
        photos = counts.photos,
        videos = counts.videos,
        audios = counts.audios,
        "resolved duplicates"
    );
    counts
}
