//! Download stage: drains the post queue into a persistence sink.
//!
//! The actual bytes-to-disk writer is a pluggable [`MediaSink`]. The crate
//! ships [`HttpFileSink`], which streams each media URL to a file named after
//! the URL's last path segment.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use search_downloader::control::CrawlControl;
//! use search_downloader::download::{Downloader, HttpFileSink};
//! use search_downloader::queue::PostQueue;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = Arc::new(HttpFileSink::new("./downloads/cars", None)?);
//! let queue = PostQueue::new();
//! let done = Downloader::new(sink, 4, CrawlControl::default()).spawn(queue.clone());
//! // ... producers enqueue, then:
//! queue.mark_complete();
//! let stats = done.await?;
//! println!("stored {}, failed {}", stats.stored(), stats.failed());
//! # Ok(())
//! # }
//! ```

mod client;
mod engine;
mod error;

use std::path::PathBuf;

use async_trait::async_trait;

pub use client::{HttpFileSink, file_name_from_url};
pub use engine::{DEFAULT_DOWNLOAD_CONCURRENCY, DownloadStats, Downloader};
pub use error::SinkError;

use crate::extract::MediaReference;

/// What a sink did with one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Written to the given path.
    Stored(PathBuf),
    /// A file for this item already existed at the given path.
    AlreadyPresent(PathBuf),
}

/// Persists one media item.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SinkError`] when the item could not be persisted; the
    /// downloader logs it and moves on.
    async fn persist(&self, item: &MediaReference) -> Result<SinkOutcome, SinkError>;
}
