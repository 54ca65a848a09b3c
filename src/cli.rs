//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

use search_downloader::crawler::DEFAULT_CONCURRENCY;
use search_downloader::download::DEFAULT_DOWNLOAD_CONCURRENCY;
use search_downloader::rate_limiter::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use search_downloader::session::DEFAULT_PAGE_SIZE;

/// Crawl a search feed and download the photos, videos and audio it links.
///
/// Result pages are crawled by concurrent chains; each chain walks every
/// N-th page, where N is the concurrency, until the feed runs dry.
#[derive(Parser, Debug, Clone)]
#[command(name = "search-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Search term to crawl
    pub target: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Concurrent page chains; also the page stride of each chain (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Simultaneous media downloads (1-100)
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub download_concurrency: u8,

    /// Posts per result page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub page_size: u32,

    /// Crawl only these pages, e.g. "1,3,5-7"
    #[arg(long, value_name = "LIST")]
    pub pages: Option<String>,

    /// Skip photos
    #[arg(long)]
    pub no_photos: bool,

    /// Skip videos
    #[arg(long)]
    pub no_videos: bool,

    /// Skip audio
    #[arg(long)]
    pub no_audio: bool,

    /// Also match photo links on any host by file extension
    #[arg(long)]
    pub regex_photos: bool,

    /// Also match video links on any host by file extension
    #[arg(long)]
    pub regex_videos: bool,

    /// Also match audio links on any host by file extension
    #[arg(long)]
    pub regex_audio: bool,

    /// Throttle result page requests
    #[arg(long)]
    pub limit_api: bool,

    /// Page requests allowed per window when --limit-api is set
    #[arg(long, default_value_t = DEFAULT_MAX_REQUESTS, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub api_max_requests: u32,

    /// Window length in seconds for --api-max-requests
    #[arg(long, default_value_t = DEFAULT_WINDOW.as_secs(), value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub api_window_secs: u64,

    /// Output directory (default: current directory)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Netscape-format cookie file exported from a logged-in browser
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Search site base URL
    #[arg(long, hide = true)]
    pub base_url: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/search-downloader/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Which defaulted arguments were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CliValueSources {
    pub concurrency: bool,
    pub download_concurrency: bool,
    pub page_size: bool,
    pub api_max_requests: bool,
    pub api_window_secs: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl CliValueSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            concurrency: is_commandline_value(matches, "concurrency"),
            download_concurrency: is_commandline_value(matches, "download_concurrency"),
            page_size: is_commandline_value(matches, "page_size"),
            api_max_requests: is_commandline_value(matches, "api_max_requests"),
            api_window_secs: is_commandline_value(matches, "api_window_secs"),
            verbose: is_commandline_value(matches, "verbose"),
            quiet: is_commandline_value(matches, "quiet"),
        }
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Parses process arguments, exiting on `--help` or invalid input.
pub fn parse_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    (args, CliValueSources::from_matches(&matches))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sources(argv: &[&str]) -> CliValueSources {
        let matches = Args::command().try_get_matches_from(argv).unwrap();
        CliValueSources::from_matches(&matches)
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["search-downloader", "cars"]).unwrap();
        assert_eq!(args.target, "cars");
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.concurrency, 10);
        assert_eq!(args.page_size, 50);
        assert_eq!(args.api_max_requests, 90);
        assert_eq!(args.api_window_secs, 60);
        assert!(args.pages.is_none());
        assert!(!args.no_photos && !args.regex_photos && !args.limit_api);
    }

    #[test]
    fn test_cli_target_is_required() {
        let err = Args::try_parse_from(["search-downloader"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["search-downloader", "cars", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["search-downloader", "cars", "-c", "100"]).unwrap();
        assert_eq!(args.concurrency, 100);

        for bad in ["0", "101"] {
            let err = Args::try_parse_from(["search-downloader", "cars", "-c", bad]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_media_flags() {
        let args = Args::try_parse_from([
            "search-downloader",
            "cars",
            "--no-videos",
            "--regex-photos",
            "--limit-api",
            "--pages",
            "1,3,5-7",
        ])
        .unwrap();
        assert!(args.no_videos);
        assert!(!args.no_photos);
        assert!(args.regex_photos);
        assert!(args.limit_api);
        assert_eq!(args.pages.as_deref(), Some("1,3,5-7"));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["search-downloader", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_value_sources_only_mark_given_flags() {
        let given = sources(&["search-downloader", "cars", "-c", "4", "-q"]);
        assert!(given.concurrency);
        assert!(given.quiet);
        assert!(!given.page_size);
        assert!(!given.verbose);

        let defaults = sources(&["search-downloader", "cars"]);
        assert!(!defaults.concurrency);
        assert!(!defaults.api_window_secs);
    }
}
