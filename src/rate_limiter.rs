//! Shared request-rate ceiling for search API calls.
//!
//! The [`RateLimiter`] admits at most `max_requests` calls per sliding
//! `window`. Every crawl chain holds the same `Arc<RateLimiter>`, so the
//! ceiling applies to the whole session regardless of concurrency.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use search_downloader::RateLimiter;
//!
//! # async fn example() {
//! // At most 90 requests per minute
//! let limiter = Arc::new(RateLimiter::new(90, Duration::from_secs(60)));
//!
//! // Resolves immediately while the window has room
//! limiter.acquire().await;
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Warning threshold for cumulative throttling delay (30 seconds).
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Default ceiling: requests per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 90;

/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window throttle shared across crawl chains.
///
/// `RateLimiter` is `Send + Sync`; wrap it in `Arc` and clone the `Arc` into
/// spawned tasks.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    /// Start times of requests admitted within the current window, oldest first.
    admitted: Mutex<VecDeque<Instant>>,
    /// Total time callers spent waiting, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter admitting `max_requests` per `window`.
    ///
    /// A ceiling of zero is treated as one request per window.
    #[must_use]
    #[instrument(skip_all, fields(max_requests = max_requests, window_ms = window.as_millis()))]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        debug!("creating rate limiter");
        let max_requests = usize::try_from(max_requests.max(1)).unwrap_or(usize::MAX);
        Self {
            max_requests,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(max_requests.min(1024))),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Total time callers have spent blocked in [`acquire`](Self::acquire).
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Requests admitted within the trailing window.
    pub async fn in_window(&self) -> usize {
        let admitted = self.admitted.lock().await;
        let now = Instant::now();
        admitted
            .iter()
            .filter(|started| now.duration_since(**started) < self.window)
            .count()
    }

    /// Waits until a request slot is free, then claims it.
    #[instrument(level = "trace", skip(self))]
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut admitted = self.admitted.lock().await;
                let now = Instant::now();
                while admitted
                    .front()
                    .is_some_and(|started| now.duration_since(*started) >= self.window)
                {
                    admitted.pop_front();
                }

                if admitted.len() < self.max_requests {
                    admitted.push_back(now);
                    return;
                }

                // Full window: the oldest entry decides when the next slot opens.
                match admitted.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };

            let cumulative = self.add_cumulative_delay(wait);
            debug!(
                delay_ms = wait.as_millis(),
                cumulative_ms = cumulative.as_millis(),
                "request ceiling reached, waiting for a slot"
            );
            if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                warn!(
                    cumulative_delay_secs = cumulative.as_secs(),
                    "excessive API throttling - consider lowering concurrency"
                );
            }

            tokio::time::sleep(wait).await;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}
