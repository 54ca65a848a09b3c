//! One self-advancing page chain.
//!
//! A [`PageCrawlWorker`] starts at its seed page and, after each page with
//! content, moves on to `page + stride`. The stride equals the session's
//! concurrency limit, so the chains seeded with `1..=stride` cover disjoint
//! residue classes and never request the same page twice.

use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use crate::control::{Checkpoint, CrawlControl};
use crate::extract::ExtractorSet;
use crate::fetch::{FetchError, PageFetcher, PageRequest, posts_fragment};
use crate::progress::{ProgressSink, ProgressUpdate, page_timed_out};
use crate::queue::PostQueue;
use crate::rate_limiter::RateLimiter;
use crate::stats::StatisticsTracker;

/// State shared read-only by every chain of one session.
pub(crate) struct ChainContext {
    pub target: String,
    pub page_size: u32,
    pub session_key: String,
    /// Distance between consecutive pages of one chain.
    pub stride: u32,
    /// Explicit page lists never self-advance.
    pub advance: bool,
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractors: ExtractorSet,
    pub stats: Arc<StatisticsTracker>,
    pub queue: PostQueue,
    /// Present only when API limiting is enabled for the session.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub control: CrawlControl,
    pub progress: Arc<dyn ProgressSink>,
}

/// Why a chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainEnd {
    /// Cancellation was observed.
    Cancelled,
    /// The source returned an empty fragment for `page`.
    EndOfResults { page: u32 },
    /// Explicit mode: the single assigned page is done.
    SinglePage { page: u32 },
    /// `page` failed; later pages of this chain are skipped.
    Failed { page: u32 },
    /// The next page number would not fit in a `u32`.
    Exhausted { page: u32 },
}

enum PageOutcome {
    Crawled { references: usize },
    Empty,
}

pub(crate) struct PageCrawlWorker {
    ctx: Arc<ChainContext>,
    page: u32,
}

impl PageCrawlWorker {
    pub(crate) fn new(ctx: Arc<ChainContext>, start_page: u32) -> Self {
        Self {
            ctx,
            page: start_page,
        }
    }

    /// Runs the chain to completion. Never fails: page errors end the chain
    /// and are logged here.
    #[instrument(skip(self), fields(target = %self.ctx.target, start = self.page))]
    pub(crate) async fn run(mut self) -> ChainEnd {
        loop {
            if self.ctx.control.checkpoint().await == Checkpoint::Stop {
                debug!(page = self.page, "chain cancelled");
                return ChainEnd::Cancelled;
            }

            match self.crawl_page(self.page).await {
                Ok(PageOutcome::Empty) => {
                    debug!(page = self.page, "end of results");
                    return ChainEnd::EndOfResults { page: self.page };
                }
                Ok(PageOutcome::Crawled { references }) => {
                    trace!(page = self.page, references, "page crawled");
                }
                Err(FetchError::Cancelled { .. }) => {
                    debug!(page = self.page, "request abandoned on cancellation");
                    return ChainEnd::Cancelled;
                }
                Err(e) if e.is_timeout() => {
                    warn!(page = self.page, error = %e, "page timed out, ending chain");
                    self.ctx
                        .progress
                        .report(ProgressUpdate::message(page_timed_out(self.page)));
                    return ChainEnd::Failed { page: self.page };
                }
                Err(e) => {
                    warn!(page = self.page, error = %e, "page failed, ending chain");
                    return ChainEnd::Failed { page: self.page };
                }
            }

            if !self.ctx.advance {
                return ChainEnd::SinglePage { page: self.page };
            }
            let Some(next) = self.page.checked_add(self.ctx.stride) else {
                return ChainEnd::Exhausted { page: self.page };
            };
            self.page = next;
        }
    }

    async fn crawl_page(&self, page: u32) -> Result<PageOutcome, FetchError> {
        let ctx = &self.ctx;

        let cancel = ctx.control.cancellation();
        if let Some(limiter) = &ctx.rate_limiter {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(FetchError::Cancelled { page }),
                () = limiter.acquire() => {}
            }
        }

        let request = PageRequest {
            target: &ctx.target,
            page,
            page_size: ctx.page_size,
            session_key: &ctx.session_key,
        };
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FetchError::Cancelled { page }),
            body = ctx.fetcher.fetch_page(&request) => body?,
        };

        let Some(fragment) = posts_fragment(&body, page)? else {
            return Ok(PageOutcome::Empty);
        };

        let found = ctx.extractors.extract(&fragment, page);
        let references = found.len();
        for reference in found {
            ctx.stats.record(&reference);
            if let Err(e) = ctx.queue.enqueue(reference) {
                warn!(page, error = %e, "queue closed while crawling");
            }
        }

        let crawled = ctx.stats.increment_pages();
        ctx.progress.report(ProgressUpdate::pages(crawled));
        Ok(PageOutcome::Crawled { references })
    }
}
