//! Crawl session orchestration.
//!
//! A [`CrawlSession`] fetches the session key, then runs the crawl stage
//! (concurrent page chains feeding the [`PostQueue`]) and the download stage
//! (a [`Downloader`] draining it) side by side. Once every chain has stopped
//! the queue is marked complete, duplicates are resolved, the downloader is
//! awaited, and the [`SessionResult`] is saved.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use search_downloader::crawler::CrawlSession;
//! use search_downloader::download::HttpFileSink;
//! use search_downloader::fetch::{DEFAULT_BASE_URL, SearchClient};
//! use search_downloader::session::Session;
//! use search_downloader::store::JsonSessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(SearchClient::new(DEFAULT_BASE_URL)?);
//! let sink = Arc::new(HttpFileSink::new("./downloads/cars", None)?);
//! let store = Arc::new(JsonSessionStore::new("./downloads"));
//!
//! let report = CrawlSession::new(Session::new("cars"), client, sink, store)
//!     .with_concurrency(3)
//!     .run()
//!     .await?;
//! println!("{} unique items", report.result.total_count);
//! # Ok(())
//! # }
//! ```

mod error;
mod worker;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

pub use error::CrawlError;
use worker::{ChainContext, ChainEnd, PageCrawlWorker};

use crate::control::CrawlControl;
use crate::download::{DEFAULT_DOWNLOAD_CONCURRENCY, DownloadStats, Downloader, MediaSink};
use crate::extract::{ExtractorSet, MediaKind};
use crate::fetch::{PageFetcher, SessionKeyFetcher};
use crate::progress::{CALCULATING_UNIQUE, ProgressSink, ProgressUpdate, TracingProgress};
use crate::queue::PostQueue;
use crate::rate_limiter::RateLimiter;
use crate::session::Session;
use crate::stats::{StatisticsTracker, resolve_duplicates};
use crate::store::{SessionResult, SessionStore};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default number of concurrent page chains.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Outcome of one finished session.
#[derive(Debug)]
pub struct CrawlReport {
    /// The result as saved to the store.
    pub result: SessionResult,
    pub downloads: DownloadStats,
    /// `true` if cancellation was observed during the run.
    pub cancelled: bool,
}

/// One crawl run for a single target.
pub struct CrawlSession {
    session: Session,
    concurrency: usize,
    download_concurrency: usize,
    keys: Arc<dyn SessionKeyFetcher>,
    pages: Arc<dyn PageFetcher>,
    sink: Arc<dyn MediaSink>,
    store: Arc<dyn SessionStore>,
    rate_limiter: Arc<RateLimiter>,
    control: CrawlControl,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for CrawlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlSession")
            .field("session", &self.session)
            .field("concurrency", &self.concurrency)
            .field("download_concurrency", &self.download_concurrency)
            .finish_non_exhaustive()
    }
}

impl CrawlSession {
    /// Creates a session using `client` for both the key and page requests.
    pub fn new<C>(
        session: Session,
        client: Arc<C>,
        sink: Arc<dyn MediaSink>,
        store: Arc<dyn SessionStore>,
    ) -> Self
    where
        C: SessionKeyFetcher + PageFetcher + 'static,
    {
        let keys: Arc<dyn SessionKeyFetcher> = client.clone();
        let pages: Arc<dyn PageFetcher> = client;
        Self {
            session,
            concurrency: DEFAULT_CONCURRENCY,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            keys,
            pages,
            sink,
            store,
            rate_limiter: Arc::new(RateLimiter::default()),
            control: CrawlControl::default(),
            progress: Arc::new(TracingProgress),
        }
    }

    /// Number of concurrent page chains; also the chain stride.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_download_concurrency(mut self, concurrency: usize) -> Self {
        self.download_concurrency = concurrency;
        self
    }

    /// Limiter consulted before each page request when the session enables
    /// API limiting.
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_control(mut self, control: CrawlControl) -> Self {
        self.control = control;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Handle for pausing or cancelling this session from elsewhere.
    #[must_use]
    pub fn control(&self) -> &CrawlControl {
        &self.control
    }

    /// Runs the session to completion.
    ///
    /// Cancellation is not an error: the report comes back with
    /// `cancelled == true` and no new completion timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidConcurrency`] for a concurrency outside
    /// 1..=100, [`CrawlError::InvalidPageSelection`] for an empty or
    /// oversized explicit page list, [`CrawlError::SessionKey`] when the key
    /// cannot be obtained, and [`CrawlError::Store`] when the result cannot
    /// be loaded or saved.
    #[instrument(skip(self), fields(target = %self.session.target, concurrency = self.concurrency))]
    pub async fn run(self) -> Result<CrawlReport, CrawlError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(CrawlError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        self.session.pages.validate()?;

        let target = self.session.target.clone();
        let previous = self.store.load(&target).await?;
        let queue = PostQueue::new();
        let stats = Arc::new(StatisticsTracker::new());

        if self.control.is_cancelled() {
            info!("cancelled before start");
            queue.mark_complete();
            let result = self.tally(&stats);
            return self.finish(result, previous, DownloadStats::new(), true).await;
        }

        let session_key = self
            .keys
            .fetch_session_key(&target)
            .await
            .map_err(|source| CrawlError::SessionKey {
                target: target.clone(),
                source,
            })?;
        debug!("session key acquired");

        let downloads = Downloader::new(
            Arc::clone(&self.sink),
            self.download_concurrency,
            self.control.clone(),
        )
        .spawn(queue.clone());

        self.crawl(session_key, &queue, &stats).await;

        queue.mark_complete();
        let result = self.tally(&stats);

        let downloads = match downloads.await {
            Ok(downloads) => downloads,
            Err(e) => {
                warn!(error = %e, "download stage panicked");
                DownloadStats::new()
            }
        };
        let cancelled = self.control.is_cancelled();
        self.finish(result, previous, downloads, cancelled).await
    }

    /// Runs every page chain and waits for all of them to stop.
    async fn crawl(&self, session_key: String, queue: &PostQueue, stats: &Arc<StatisticsTracker>) {
        let stride = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        let ctx = Arc::new(ChainContext {
            target: self.session.target.clone(),
            page_size: self.session.page_size,
            session_key,
            stride,
            advance: !self.session.pages.is_explicit(),
            fetcher: Arc::clone(&self.pages),
            extractors: ExtractorSet::from_flags(self.session.media),
            stats: Arc::clone(stats),
            queue: queue.clone(),
            rate_limiter: self
                .session
                .limit_api
                .then(|| Arc::clone(&self.rate_limiter)),
            control: self.control.clone(),
            progress: Arc::clone(&self.progress),
        });

        let gate = Arc::new(Semaphore::new(self.concurrency));
        let mut chains = JoinSet::new();

        for page in self.session.pages.initial_pages(self.concurrency) {
            let permit = tokio::select! {
                biased;
                () = self.control.cancellation().cancelled() => break,
                permit = Arc::clone(&gate).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let worker = PageCrawlWorker::new(Arc::clone(&ctx), page);
            chains.spawn(async move {
                let end = worker.run().await;
                drop(permit);
                end
            });
        }

        while let Some(joined) = chains.join_next().await {
            match joined {
                Ok(ChainEnd::Failed { page }) => debug!(page, "chain ended on failure"),
                Ok(end) => debug!(?end, "chain finished"),
                Err(e) => warn!(error = %e, "page chain panicked"),
            }
        }

        info!(pages = stats.pages_crawled(), "crawl stage finished");
    }

    /// Counts duplicates among the discovered references and builds the
    /// unstamped result. The reference lists are dropped afterwards.
    fn tally(&self, stats: &StatisticsTracker) -> SessionResult {
        self.progress.report(ProgressUpdate::message(CALCULATING_UNIQUE));

        let snapshot = stats.snapshot();
        let duplicates = resolve_duplicates(&snapshot);
        let discovered: BTreeMap<MediaKind, usize> = MediaKind::ALL
            .into_iter()
            .map(|kind| (kind, snapshot.discovered(kind)))
            .collect();
        stats.clear_references();

        SessionResult {
            target: self.session.target.clone(),
            total_count: snapshot
                .total_discovered()
                .saturating_sub(duplicates.total()),
            duplicates,
            discovered,
            pages_crawled: snapshot.pages_crawled,
            last_complete_crawl: None,
        }
    }

    /// Stamps the completion time unless cancelled, saves the result, and
    /// clears the status line.
    async fn finish(
        &self,
        mut result: SessionResult,
        previous: Option<SessionResult>,
        downloads: DownloadStats,
        cancelled: bool,
    ) -> Result<CrawlReport, CrawlError> {
        result.last_complete_crawl = if cancelled {
            previous.and_then(|p| p.last_complete_crawl)
        } else {
            Some(Utc::now())
        };

        let saved = self.store.save(&result).await;
        self.progress.report(ProgressUpdate::clear());
        saved?;

        info!(
            total = result.total_count,
            duplicates = result.duplicates.total(),
            pages = result.pages_crawled,
            cancelled,
            "session finished"
        );

        Ok(CrawlReport {
            result,
            downloads,
            cancelled,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::worker::tests::{FakeFetcher, page_body};
    use super::*;
    use crate::download::{SinkError, SinkOutcome};
    use crate::extract::MediaReference;
    use crate::fetch::{FetchError, PageRequest};
    use crate::progress::RecordingProgress;
    use crate::session::{PageSelection, PageSelectionError};
    use crate::store::MemorySessionStore;

    /// Fake search source: key lookups are counted, pages are delegated.
    struct FakeSource {
        key: Option<String>,
        key_requests: AtomicUsize,
        pages: FakeFetcher,
    }

    impl FakeSource {
        fn new(pages: FakeFetcher) -> Self {
            Self {
                key: Some("key".to_string()),
                key_requests: AtomicUsize::new(0),
                pages,
            }
        }
    }

    #[async_trait]
    impl SessionKeyFetcher for FakeSource {
        async fn fetch_session_key(&self, target: &str) -> Result<String, FetchError> {
            self.key_requests.fetch_add(1, Ordering::SeqCst);
            self.key.clone().ok_or_else(|| FetchError::MissingSessionKey {
                url: format!("https://example.com/search/{target}"),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for FakeSource {
        async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<String, FetchError> {
            self.pages.fetch_page(request).await
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        items: Mutex<Vec<MediaReference>>,
    }

    #[async_trait]
    impl MediaSink for CollectingSink {
        async fn persist(&self, item: &MediaReference) -> Result<SinkOutcome, SinkError> {
            self.items.lock().unwrap().push(item.clone());
            Ok(SinkOutcome::Stored(PathBuf::from(&item.url)))
        }
    }

    fn build(
        source: Arc<FakeSource>,
        session: Session,
    ) -> (CrawlSession, Arc<CollectingSink>, Arc<MemorySessionStore>) {
        let sink = Arc::new(CollectingSink::default());
        let store = Arc::new(MemorySessionStore::new());
        let crawl = CrawlSession::new(session, source, sink.clone(), store.clone());
        (crawl, sink, store)
    }

    #[tokio::test]
    async fn test_open_ended_covers_every_content_page_once() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(5)));
        let (crawl, sink, store) = build(source.clone(), Session::new("cars"));

        let report = crawl.with_concurrency(3).run().await.unwrap();

        // Pages 1-5 carry content; 6, 7, 8 are each residue's empty terminator.
        assert_eq!(source.pages.requested(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(source.key_requests.load(Ordering::SeqCst), 1);
        assert_eq!(report.result.pages_crawled, 5);
        assert_eq!(report.result.total_count, 5);
        assert_eq!(report.downloads.stored(), 5);
        assert_eq!(sink.items.lock().unwrap().len(), 5);
        assert!(report.result.last_complete_crawl.is_some());
        assert!(!report.cancelled);
        assert_eq!(store.get("cars").unwrap(), report.result);
    }

    #[tokio::test]
    async fn test_explicit_pages_fetched_once_without_advancing() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(10)));
        let session =
            Session::new("cars").with_pages(PageSelection::Explicit(vec![2, 4, 7]));
        let (crawl, _, _) = build(source.clone(), session);

        let report = crawl.with_concurrency(2).run().await.unwrap();

        assert_eq!(source.pages.requested(), vec![2, 4, 7]);
        assert_eq!(report.result.pages_crawled, 3);
    }

    #[tokio::test]
    async fn test_cancel_before_start_makes_no_requests() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(5)));
        let (crawl, sink, store) = build(source.clone(), Session::new("cars"));
        let control = CrawlControl::default();
        control.cancellation().cancel();

        let report = crawl.with_control(control).run().await.unwrap();

        assert!(report.cancelled);
        assert!(report.result.last_complete_crawl.is_none());
        assert_eq!(source.key_requests.load(Ordering::SeqCst), 0);
        assert!(source.pages.requested().is_empty());
        assert!(sink.items.lock().unwrap().is_empty());
        assert!(store.get("cars").is_some(), "result is saved even when cancelled");
    }

    #[tokio::test]
    async fn test_cancelled_run_keeps_previous_timestamp() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(5)));
        let sink = Arc::new(CollectingSink::default());
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut previous = SessionResult::new("cars");
        previous.last_complete_crawl = Some(earlier);
        let store = Arc::new(MemorySessionStore::new().with_result(previous));
        let control = CrawlControl::default();
        control.cancellation().cancel();

        let report = CrawlSession::new(Session::new("cars"), source, sink, store.clone())
            .with_control(control)
            .run()
            .await
            .unwrap();

        assert_eq!(report.result.last_complete_crawl, Some(earlier));
        assert_eq!(store.get("cars").unwrap().last_complete_crawl, Some(earlier));
    }

    #[tokio::test]
    async fn test_missing_session_key_is_fatal() {
        let mut source = FakeSource::new(FakeFetcher::with_content_pages(5));
        source.key = None;
        let source = Arc::new(source);
        let (crawl, _, store) = build(source.clone(), Session::new("cars"));

        let err = crawl.run().await.unwrap_err();

        assert!(matches!(err, CrawlError::SessionKey { .. }));
        assert!(source.pages.requested().is_empty());
        assert!(store.get("cars").is_none());
    }

    #[tokio::test]
    async fn test_invalid_concurrency_rejected() {
        let source = Arc::new(FakeSource::new(FakeFetcher::default()));
        let (crawl, _, _) = build(source.clone(), Session::new("cars"));
        let err = crawl.with_concurrency(0).run().await.unwrap_err();
        assert!(matches!(err, CrawlError::InvalidConcurrency { value: 0 }));

        let (crawl, _, _) = build(source, Session::new("cars"));
        let err = crawl.with_concurrency(101).run().await.unwrap_err();
        assert!(matches!(err, CrawlError::InvalidConcurrency { value: 101 }));
    }

    #[tokio::test]
    async fn test_empty_explicit_selection_rejected_before_any_request() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(3)));
        let session = Session::new("cars").with_pages(PageSelection::Explicit(Vec::new()));
        let (crawl, _, store) = build(source.clone(), session);

        let err = crawl.run().await.unwrap_err();

        assert!(matches!(
            err,
            CrawlError::InvalidPageSelection(PageSelectionError::Empty)
        ));
        assert_eq!(source.key_requests.load(Ordering::SeqCst), 0);
        assert!(store.get("cars").is_none());
    }

    #[tokio::test]
    async fn test_pause_mid_crawl_halts_requests_and_resumes_without_gaps() {
        let mut pages = FakeFetcher::with_content_pages(20);
        pages.delay = Some(Duration::from_millis(10));
        let source = Arc::new(FakeSource::new(pages));
        let (crawl, _, _) = build(source.clone(), Session::new("cars"));
        let control = crawl.control().clone();

        let handle = tokio::spawn(crawl.with_concurrency(2).run());
        tokio::time::sleep(Duration::from_millis(35)).await;
        control.pause_controller().pause();

        // Requests already in flight may still land.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let while_paused = source.pages.requested().len();
        assert!(while_paused > 0, "crawl should have started before the pause");
        assert!(while_paused < 22, "crawl should not have finished before the pause");
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            source.pages.requested().len(),
            while_paused,
            "no new requests while paused"
        );

        control.pause_controller().resume();
        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Pages 1-20 carry content; 21 and 22 end the two residue classes.
        assert_eq!(source.pages.requested(), (1..=22).collect::<Vec<u32>>());
        assert_eq!(report.result.pages_crawled, 20);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_duplicate_across_pages_reduces_total() {
        let shared = r#"<img src="https://64.media.tumblr.com/x/tumblr_same_1280.jpg">"#;
        let mut pages = FakeFetcher::default();
        pages.pages.insert(1, Ok(page_body(shared)));
        pages.pages.insert(
            2,
            Ok(page_body(&format!(
                r#"{shared}<img src="https://64.media.tumblr.com/x/tumblr_other_1280.jpg">"#
            ))),
        );
        let source = Arc::new(FakeSource::new(pages));
        let (crawl, _, _) = build(source, Session::new("cars"));

        let report = crawl.with_concurrency(2).run().await.unwrap();

        assert_eq!(report.result.discovered[&MediaKind::Photo], 3);
        assert_eq!(report.result.duplicates.photos, 1);
        assert_eq!(report.result.total_count, 2);
    }

    #[tokio::test]
    async fn test_progress_ends_with_calculating_then_clear() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(2)));
        let (crawl, _, _) = build(source, Session::new("cars"));
        let progress = Arc::new(RecordingProgress::new());

        crawl
            .with_concurrency(1)
            .with_progress(progress.clone())
            .run()
            .await
            .unwrap();

        let updates = progress.updates();
        let messages: Vec<&str> = updates.iter().map(|u| u.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Evaluated 1 result pages...",
                "Evaluated 2 result pages...",
                CALCULATING_UNIQUE,
                "",
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_crawl_leaves_no_timestamp() {
        let mut pages = FakeFetcher::with_content_pages(1000);
        pages.delay = Some(Duration::from_millis(5));
        let source = Arc::new(FakeSource::new(pages));
        let (crawl, _, store) = build(source.clone(), Session::new("cars"));
        let control = crawl.control().clone();

        let handle = tokio::spawn(crawl.with_concurrency(4).run());
        tokio::time::sleep(Duration::from_millis(40)).await;
        control.cancellation().cancel();

        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(report.cancelled);
        assert!(report.result.last_complete_crawl.is_none());
        assert!(report.result.pages_crawled < 1000);
        assert!(store.get("cars").is_some());
    }

    #[tokio::test]
    async fn test_cancel_releases_session_waiting_for_rate_limit() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(100)));
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(30)));
        let (crawl, _, _) = build(source.clone(), Session::new("cars").with_api_limit(true));
        let control = crawl.control().clone();

        let handle = tokio::spawn(crawl.with_concurrency(1).with_rate_limiter(limiter).run());
        tokio::time::sleep(Duration::from_millis(200)).await;
        control.cancellation().cancel();

        let report = tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(source.pages.requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_rate_limiter_used_only_when_enabled() {
        let source = Arc::new(FakeSource::new(FakeFetcher::with_content_pages(3)));
        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)));
        let (crawl, _, _) = build(source, Session::new("cars").with_api_limit(true));

        crawl
            .with_concurrency(1)
            .with_rate_limiter(limiter.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(limiter.in_window().await, 4);
    }
}
