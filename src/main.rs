//! CLI entry point for search-downloader.

use std::sync::Arc;

use anyhow::{Context, Result};
use search_downloader::auth::load_cookie_jar;
use search_downloader::config::load_config;
use search_downloader::control::CrawlControl;
use search_downloader::crawler::CrawlSession;
use search_downloader::download::HttpFileSink;
use search_downloader::fetch::SearchClient;
use search_downloader::progress::{ProgressSink, TracingProgress};
use search_downloader::rate_limiter::RateLimiter;
use search_downloader::store::{JsonSessionStore, target_file_stem};
use tracing::{debug, info, warn};

mod cli;
mod settings;
mod terminal;

use terminal::SpinnerProgress;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, sources) = cli::parse_with_sources();
    let file_config = load_config(args.config.as_deref())?;
    let settings = settings::resolve(args, &sources, file_config.as_ref())?;

    terminal::init_tracing(settings.log_level(), settings.force_log_level);
    debug!(?settings, "settings resolved");

    let target = settings.session.target.clone();
    info!(target = %target, concurrency = settings.concurrency, "search-downloader starting");

    let cookie_jar = settings
        .cookies
        .as_deref()
        .map(load_cookie_jar)
        .transpose()
        .context("Failed to load cookie file")?;

    let client = match &cookie_jar {
        Some(jar) => SearchClient::with_cookie_jar(&settings.base_url, Arc::clone(jar)),
        None => SearchClient::new(&settings.base_url),
    }
    .context("Failed to create search client")?;

    let media_dir = settings.output_dir.join(target_file_stem(&target));
    let sink = HttpFileSink::new(media_dir, cookie_jar).context("Failed to create download client")?;
    let store = JsonSessionStore::new(&settings.output_dir);
    let rate_limiter = Arc::new(RateLimiter::new(settings.api_max_requests, settings.api_window));

    let control = CrawlControl::default();
    let cancel = control.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping crawl");
            cancel.cancel();
        }
    });

    let spinner = terminal::spinner_requested(settings.quiet).then(SpinnerProgress::start);
    let progress: Arc<dyn ProgressSink> = match &spinner {
        Some(spinner) => Arc::new(spinner.clone()),
        None => Arc::new(TracingProgress),
    };

    let outcome = CrawlSession::new(settings.session.clone(), Arc::new(client), Arc::new(sink), Arc::new(store))
        .with_concurrency(settings.concurrency)
        .with_download_concurrency(settings.download_concurrency)
        .with_rate_limiter(rate_limiter)
        .with_control(control)
        .with_progress(progress)
        .run()
        .await;

    if let Some(spinner) = &spinner {
        spinner.finish();
    }
    let report = outcome.with_context(|| format!("Crawl of '{target}' failed"))?;

    info!(
        unique = report.result.total_count,
        duplicates = report.result.duplicates.total(),
        pages = report.result.pages_crawled,
        stored = report.downloads.stored(),
        already_present = report.downloads.already_present(),
        failed = report.downloads.failed(),
        repeated = report.downloads.repeated(),
        cancelled = report.cancelled,
        "Crawl complete"
    );

    Ok(())
}
