//! Effective run settings: command line first, config file second, built-in
//! defaults last.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use search_downloader::config::{FileConfig, VerbositySetting};
use search_downloader::fetch::DEFAULT_BASE_URL;
use search_downloader::session::{MediaFlags, PageSelection, Session};

use crate::cli::{Args, CliValueSources};

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub session: Session,
    pub concurrency: usize,
    pub download_concurrency: usize,
    pub api_max_requests: u32,
    pub api_window: Duration,
    pub output_dir: PathBuf,
    pub cookies: Option<PathBuf>,
    pub base_url: String,
    pub verbose: u8,
    pub quiet: bool,
    /// `-v`/`-q` were given and take precedence over `RUST_LOG`.
    pub force_log_level: bool,
}

impl RunSettings {
    /// Default tracing level for these settings.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

/// Merges CLI arguments with the optional file config.
pub fn resolve(args: Args, sources: &CliValueSources, file: Option<&FileConfig>) -> Result<RunSettings> {
    let file = file.cloned().unwrap_or_default();

    let pick_u8 = |given: bool, cli: u8, config: Option<u8>| if given { cli } else { config.unwrap_or(cli) };
    let concurrency = pick_u8(sources.concurrency, args.concurrency, file.concurrency);
    let download_concurrency = pick_u8(
        sources.download_concurrency,
        args.download_concurrency,
        file.download_concurrency,
    );
    let page_size = if sources.page_size {
        args.page_size
    } else {
        file.page_size.unwrap_or(args.page_size)
    };
    let api_max_requests = if sources.api_max_requests {
        args.api_max_requests
    } else {
        file.api_max_requests.unwrap_or(args.api_max_requests)
    };
    let api_window_secs = if sources.api_window_secs {
        args.api_window_secs
    } else {
        file.api_window_secs.unwrap_or(args.api_window_secs)
    };

    // `--no-x` always wins; otherwise the file may switch a kind off.
    let media = MediaFlags {
        photo: !args.no_photos && file.photos.unwrap_or(true),
        video: !args.no_videos && file.videos.unwrap_or(true),
        audio: !args.no_audio && file.audio.unwrap_or(true),
        generic_photo: args.regex_photos || file.regex_photos.unwrap_or(false),
        generic_video: args.regex_videos || file.regex_videos.unwrap_or(false),
        generic_audio: args.regex_audio || file.regex_audio.unwrap_or(false),
    };

    let pages = match args.pages.as_deref() {
        Some(raw) => PageSelection::parse(raw).with_context(|| format!("Invalid --pages value '{raw}'"))?,
        None => PageSelection::OpenEnded,
    };

    let session = Session::new(args.target)
        .with_page_size(page_size)
        .with_pages(pages)
        .with_media(media)
        .with_api_limit(args.limit_api || file.limit_api.unwrap_or(false));

    let (mut verbose, mut quiet) = (args.verbose, args.quiet);
    let force_log_level = sources.verbose || sources.quiet;
    if !force_log_level && let Some(verbosity) = file.verbosity {
        (verbose, quiet) = match verbosity {
            VerbositySetting::Default => (0, false),
            VerbositySetting::Verbose => (1, false),
            VerbositySetting::Debug => (2, false),
            VerbositySetting::Quiet => (0, true),
        };
    }

    Ok(RunSettings {
        session,
        concurrency: usize::from(concurrency),
        download_concurrency: usize::from(download_concurrency),
        api_max_requests,
        api_window: Duration::from_secs(api_window_secs),
        output_dir: args
            .output_dir
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
        cookies: args.cookies.or(file.cookies),
        base_url: args
            .base_url
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        verbose,
        quiet,
        force_log_level,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::{CommandFactory, FromArgMatches};

    use super::*;

    fn parse(argv: &[&str]) -> (Args, CliValueSources) {
        let matches = Args::command().try_get_matches_from(argv).unwrap();
        let args = Args::from_arg_matches(&matches).unwrap();
        let sources = CliValueSources {
            concurrency: matches.value_source("concurrency") == Some(clap::parser::ValueSource::CommandLine),
            page_size: matches.value_source("page_size") == Some(clap::parser::ValueSource::CommandLine),
            quiet: args.quiet,
            verbose: args.verbose > 0,
            ..CliValueSources::default()
        };
        (args, sources)
    }

    #[test]
    fn test_defaults_without_config() {
        let (args, sources) = parse(&["search-downloader", "cars"]);
        let settings = resolve(args, &sources, None).unwrap();

        assert_eq!(settings.session.target, "cars");
        assert_eq!(settings.concurrency, 10);
        assert_eq!(settings.session.page_size, 50);
        assert_eq!(settings.session.pages, PageSelection::OpenEnded);
        assert_eq!(settings.session.media, MediaFlags::default());
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.log_level(), "info");
    }

    #[test]
    fn test_config_fills_unset_values_only() {
        let file = FileConfig {
            concurrency: Some(3),
            page_size: Some(20),
            videos: Some(false),
            regex_audio: Some(true),
            output_dir: Some(PathBuf::from("/data")),
            verbosity: Some(VerbositySetting::Quiet),
            ..FileConfig::default()
        };
        let (args, sources) = parse(&["search-downloader", "cars", "-c", "7"]);
        let settings = resolve(args, &sources, Some(&file)).unwrap();

        assert_eq!(settings.concurrency, 7, "explicit flag beats config");
        assert_eq!(settings.session.page_size, 20);
        assert!(!settings.session.media.video);
        assert!(settings.session.media.generic_audio);
        assert_eq!(settings.output_dir, PathBuf::from("/data"));
        assert_eq!(settings.log_level(), "error");
    }

    #[test]
    fn test_cli_verbosity_beats_config() {
        let file = FileConfig {
            verbosity: Some(VerbositySetting::Quiet),
            ..FileConfig::default()
        };
        let (args, sources) = parse(&["search-downloader", "cars", "-v"]);
        let settings = resolve(args, &sources, Some(&file)).unwrap();
        assert_eq!(settings.log_level(), "debug");
        assert!(settings.force_log_level);
    }

    #[test]
    fn test_explicit_pages_parsed() {
        let (args, sources) = parse(&["search-downloader", "cars", "--pages", "2,4,7"]);
        let settings = resolve(args, &sources, None).unwrap();
        assert_eq!(settings.session.pages, PageSelection::Explicit(vec![2, 4, 7]));
    }

    #[test]
    fn test_invalid_pages_rejected() {
        let (args, sources) = parse(&["search-downloader", "cars", "--pages", "7-3"]);
        let err = resolve(args, &sources, None).unwrap_err();
        assert!(format!("{err:#}").contains("7-3"));
    }
}
