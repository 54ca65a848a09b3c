//! Terminal output: tracing setup and the crawl status spinner.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use search_downloader::progress::{ProgressSink, ProgressUpdate};

pub fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub fn should_use_spinner(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Spinner only for interactive, non-quiet runs.
pub fn spinner_requested(quiet: bool) -> bool {
    should_use_spinner(std::io::stderr().is_terminal(), quiet, is_dumb_terminal())
}

/// Priority: `-v`/`-q` given on the command line > `RUST_LOG` > config/default.
pub fn init_tracing(default_level: &str, force_cli_level: bool) {
    let filter = if force_cli_level {
        tracing_subscriber::EnvFilter::new(default_level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Shows crawl status text on a steady spinner.
#[derive(Debug, Clone)]
pub struct SpinnerProgress {
    spinner: ProgressBar,
}

impl SpinnerProgress {
    pub fn start() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressSink for SpinnerProgress {
    fn report(&self, update: ProgressUpdate) {
        self.spinner.set_message(update.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_needs_interactive_non_quiet_terminal() {
        assert!(should_use_spinner(true, false, false));
        assert!(!should_use_spinner(false, false, false));
        assert!(!should_use_spinner(true, true, false));
        assert!(!should_use_spinner(true, false, true));
    }

    #[test]
    fn test_spinner_progress_accepts_updates() {
        let progress = SpinnerProgress::start();
        progress.report(ProgressUpdate::pages(3));
        progress.report(ProgressUpdate::clear());
        progress.finish();
    }
}
