//! Search Downloader Core Library
//!
//! Crawls the paginated results of a site search and downloads the photos,
//! videos and audio files the result pages reference.
//!
//! # Architecture
//!
//! A crawl runs two stages side by side:
//! - the crawl stage: [`crawler::CrawlSession`] starts one self-advancing
//!   chain per concurrency slot. The chain seeded with page `i` visits
//!   `i, i + C, i + 2C, ...` until the source returns an empty page, so the
//!   chains cover disjoint residue classes without sharing a page counter.
//!   Every media reference found is recorded in [`stats`] and handed to the
//!   [`queue::PostQueue`].
//! - the download stage: [`download::Downloader`] drains the queue into a
//!   [`download::MediaSink`] while the crawl is still running.
//!
//! Once all chains stop, duplicates are counted, the downloader finishes, and
//! a [`store::SessionResult`] is saved.
//!
//! The library is organized into the following modules:
//! - [`session`] - Crawl description: target, paging, media flags
//! - [`control`] - Pause and cancellation handles
//! - [`rate_limiter`] - Sliding-window throttle for page requests
//! - [`fetch`] - Session key and result page requests
//! - [`extract`] - Media URL extraction from page content
//! - [`queue`] - Hand-off queue between crawl and download
//! - [`stats`] - Discovery statistics and duplicate accounting
//! - [`download`] - Queue-draining downloader and file sink
//! - [`crawler`] - Session orchestration and page chains
//! - [`progress`] - UI-agnostic status reporting
//! - [`store`] - Session result persistence
//! - [`auth`] - Cookie file loading
//! - [`config`] - TOML file configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod control;
pub mod crawler;
pub mod download;
pub mod extract;
pub mod fetch;
pub mod progress;
pub mod queue;
pub mod rate_limiter;
pub mod session;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use control::{CancellationToken, CrawlControl, PauseController};
pub use crawler::{CrawlError, CrawlReport, CrawlSession};
pub use download::{DownloadStats, Downloader, HttpFileSink, MediaSink, SinkError, SinkOutcome};
pub use extract::{MediaKind, MediaReference};
pub use fetch::{FetchError, PageFetcher, SearchClient, SessionKeyFetcher};
pub use progress::{ProgressSink, ProgressUpdate};
pub use queue::PostQueue;
pub use rate_limiter::RateLimiter;
pub use session::{MediaFlags, PageSelection, Session};
pub use stats::{DuplicateCounts, StatisticsSnapshot, StatisticsTracker, resolve_duplicates};
pub use store::{JsonSessionStore, SessionResult, SessionStore};
