//! Optional TOML file configuration for CLI defaults.
//!
//! Values from the file only apply when the matching command-line flag was
//! not given. Every field is optional; unknown keys are rejected so that
//! typos surface instead of being silently ignored.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

/// Directory name under the user config dir.
const APP_DIR: &str = "search-downloader";

/// File-backed defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Root download directory; each target gets a subdirectory.
    pub output_dir: Option<PathBuf>,
    /// Concurrent page chains (1..=100).
    pub concurrency: Option<u8>,
    /// Simultaneous media downloads (1..=100).
    pub download_concurrency: Option<u8>,
    /// Posts per result page.
    pub page_size: Option<u32>,
    pub photos: Option<bool>,
    pub videos: Option<bool>,
    pub audio: Option<bool>,
    pub regex_photos: Option<bool>,
    pub regex_videos: Option<bool>,
    pub regex_audio: Option<bool>,
    /// Throttle page requests through the API rate limiter.
    pub limit_api: Option<bool>,
    pub api_max_requests: Option<u32>,
    pub api_window_secs: Option<u64>,
    /// Netscape cookie file.
    pub cookies: Option<PathBuf>,
    pub base_url: Option<String>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Fails on TOML syntax errors, unknown keys, wrong value types, and
    /// out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Invalid config syntax")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values against the same ranges the CLI enforces.
    ///
    /// # Errors
    ///
    /// Names the first out-of-range field.
    pub fn validate(&self) -> Result<()> {
        validate_range("concurrency", self.concurrency, 1..=100)?;
        validate_range("download_concurrency", self.download_concurrency, 1..=100)?;
        validate_range("page_size", self.page_size, 1..=1000)?;
        validate_range("api_max_requests", self.api_max_requests, 1..=10_000)?;
        validate_range("api_window_secs", self.api_window_secs, 1..=3600)?;

        if let Some(base_url) = &self.base_url
            && url::Url::parse(base_url).is_err()
        {
            bail!("Invalid config value for `base_url`: '{base_url}' is not an absolute URL");
        }
        Ok(())
    }
}

fn validate_range<T>(field: &str, value: Option<T>, range: std::ops::RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    let Some(value) = value else {
        return Ok(());
    };
    if !range.contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/search-downloader/config.toml`
/// 2. `$HOME/.config/search-downloader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Reads and validates the config file at `path`.
///
/// # Errors
///
/// Fails if the file cannot be read or does not validate.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    FileConfig::from_toml_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Loads `explicit` if given, otherwise the default path when it exists.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
///
/// # Errors
///
/// Fails if a config file exists but cannot be loaded.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return load_file_config(path).map(Some);
    }

    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    debug!(path = %path.display(), "loading config file");
    load_file_config(&path).map(Some)
}
