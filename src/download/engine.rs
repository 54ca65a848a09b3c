//! Queue-draining downloader.
//!
//! The [`Downloader`] runs alongside the crawl stage: it pulls items from the
//! [`PostQueue`] as they arrive, hands each to a [`MediaSink`] under a
//! semaphore-bounded concurrency limit, and finishes once the queue is
//! complete and drained.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use super::{MediaSink, SinkOutcome};
use crate::control::{Checkpoint, CrawlControl};
use crate::queue::PostQueue;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default simultaneous downloads.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;

/// Per-item outcome counters for one drain run.
#[derive(Debug, Default)]
pub struct DownloadStats {
    stored: AtomicUsize,
    already_present: AtomicUsize,
    failed: AtomicUsize,
    repeated: AtomicUsize,
}

impl DownloadStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stored(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn already_present(&self) -> usize {
        self.already_present.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Items skipped because the same URL was already handed to the sink
    /// during this run.
    #[must_use]
    pub fn repeated(&self) -> usize {
        self.repeated.load(Ordering::SeqCst)
    }

    /// Items handed to the sink, whatever the outcome.
    #[must_use]
    pub fn total(&self) -> usize {
        self.stored() + self.already_present() + self.failed()
    }

    fn record(&self, outcome: &SinkOutcome) {
        match outcome {
            SinkOutcome::Stored(_) => self.stored.fetch_add(1, Ordering::SeqCst),
            SinkOutcome::AlreadyPresent(_) => self.already_present.fetch_add(1, Ordering::SeqCst),
        };
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Drains a [`PostQueue`] into a [`MediaSink`].
#[derive(Clone)]
pub struct Downloader {
    sink: Arc<dyn MediaSink>,
    concurrency: usize,
    control: CrawlControl,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Creates a downloader; `concurrency` is clamped to 1..=100.
    #[must_use]
    pub fn new(sink: Arc<dyn MediaSink>, concurrency: usize, control: CrawlControl) -> Self {
        Self {
            sink,
            concurrency: concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            control,
        }
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Starts draining on a background task and returns its completion handle.
    #[must_use]
    pub fn spawn(self, queue: PostQueue) -> JoinHandle<DownloadStats> {
        tokio::spawn(async move { self.run(queue).await })
    }

    /// Drains `queue` until it is complete and empty, or cancellation is
    /// signalled. Sink failures are logged and counted; they never stop the
    /// loop.
    #[instrument(skip(self, queue), fields(concurrency = self.concurrency))]
    pub async fn run(&self, queue: PostQueue) -> DownloadStats {
        let stats = Arc::new(DownloadStats::new());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut seen = HashSet::new();

        info!("starting downloader");

        loop {
            if self.control.checkpoint().await == Checkpoint::Stop {
                debug!("downloader cancelled");
                break;
            }

            let next = tokio::select! {
                biased;
                () = self.control.cancellation().cancelled() => None,
                item = queue.dequeue() => item,
            };
            let Some(item) = next else {
                break;
            };
            if !seen.insert(item.url.clone()) {
                debug!(url = %item.url, "skipping repeated reference");
                stats.repeated.fetch_add(1, Ordering::SeqCst);
                continue;
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                warn!("download semaphore closed unexpectedly");
                break;
            };

            while let Some(finished) = tasks.try_join_next() {
                log_task_panic(finished);
            }

            let sink = Arc::clone(&self.sink);
            let stats = Arc::clone(&stats);
            tasks.spawn(async move {
                let _permit = permit;
                match sink.persist(&item).await {
                    Ok(outcome) => stats.record(&outcome),
                    Err(e) => {
                        warn!(url = %item.url, kind = %item.kind, page = item.page, error = %e, "download failed");
                        stats.increment_failed();
                    }
                }
            });
        }

        debug!(task_count = tasks.len(), "waiting for downloads to complete");
        while let Some(finished) = tasks.join_next().await {
            log_task_panic(finished);
        }

        info!(
            stored = stats.stored(),
            already_present = stats.already_present(),
            failed = stats.failed(),
            repeated = stats.repeated(),
            "downloader finished"
        );

        Arc::try_unwrap(stats).unwrap_or_else(|shared| {
            let copy = DownloadStats::new();
            copy.stored.store(shared.stored(), Ordering::SeqCst);
            copy.already_present
                .store(shared.already_present(), Ordering::SeqCst);
            copy.failed.store(shared.failed(), Ordering::SeqCst);
            copy.repeated.store(shared.repeated(), Ordering::SeqCst);
            copy
        })
    }
}

fn log_task_panic(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        warn!(error = %e, "download task panicked");
    }
}
