//! Netscape cookie file loading.
//!
//! Browser exports use one cookie per line with seven TAB-separated fields:
//! `domain  include_subdomains  path  secure  expires  name  value`.
//! curl writes HTTP-only cookies with a `#HttpOnly_` prefix on the domain,
//! which is honoured here rather than treated as a comment.

use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use reqwest::cookie::Jar;
use tracing::{debug, info, instrument, warn};

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One cookie from a cookie file. The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieLine {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix seconds; 0 marks a session cookie.
    pub expires: u64,
    pub name: String,
    value: String,
}

impl CookieLine {
    /// Cookie value. Sensitive, do not log.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `Set-Cookie` form understood by [`Jar::add_cookie_str`].
    fn to_set_cookie(&self) -> String {
        let mut header = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if self.expires > 0 {
            match UNIX_EPOCH.checked_add(Duration::from_secs(self.expires)) {
                Some(at) => {
                    header.push_str("; Expires=");
                    header.push_str(&httpdate::fmt_http_date(at));
                }
                None => warn!(name = %self.name, "cookie expiry out of range, keeping as session cookie"),
            }
        }
        header
    }

    fn origin(&self) -> Option<url::Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        url::Url::parse(&format!("{scheme}://{host}{}", self.path)).ok()
    }
}

impl fmt::Debug for CookieLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieLine")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("failed to read cookie file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file had cookie lines but none of them parsed.
    #[error("no usable cookies in {path} ({skipped} malformed lines)")]
    NoCookies { path: String, skipped: usize },
}

/// Parsed cookies plus the 1-based numbers of the lines that were skipped.
#[derive(Debug, Default)]
pub struct CookieFile {
    pub cookies: Vec<CookieLine>,
    pub skipped_lines: Vec<usize>,
}

/// Parses cookie lines, skipping comments, blanks, and malformed lines.
///
/// # Errors
///
/// Returns the underlying I/O error if the reader fails.
pub fn parse_cookie_lines(reader: impl BufRead) -> std::io::Result<CookieFile> {
    let mut parsed = CookieFile::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line, http_only) {
            Some(cookie) => parsed.cookies.push(cookie),
            None => {
                warn!(line = idx + 1, "skipping malformed cookie line");
                parsed.skipped_lines.push(idx + 1);
            }
        }
    }

    Ok(parsed)
}

fn parse_line(line: &str, http_only: bool) -> Option<CookieLine> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, include_subdomains, path, secure, expires, name, value] = fields.as_slice() else {
        return None;
    };
    if domain.is_empty() || name.is_empty() {
        return None;
    }
    Some(CookieLine {
        domain: (*domain).to_string(),
        include_subdomains: parse_flag(include_subdomains)?,
        path: if path.is_empty() { "/" } else { *path }.to_string(),
        secure: parse_flag(secure)?,
        http_only,
        expires: expires.parse().ok()?,
        name: (*name).to_string(),
        value: (*value).to_string(),
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "TRUE" | "true" => Some(true),
        "FALSE" | "false" => Some(false),
        _ => None,
    }
}

/// Builds a cookie jar for the HTTP clients.
#[must_use]
pub fn cookie_jar(cookies: &[CookieLine]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());
    for cookie in cookies {
        match cookie.origin() {
            Some(origin) => {
                jar.add_cookie_str(&cookie.to_set_cookie(), &origin);
                debug!(domain = %cookie.domain, name = %cookie.name, "cookie added");
            }
            None => warn!(domain = %cookie.domain, name = %cookie.name, "cookie domain is not a valid host"),
        }
    }
    jar
}

/// Reads a cookie file into a jar.
///
/// # Errors
///
/// Returns [`CookieError::Io`] if the file cannot be read and
/// [`CookieError::NoCookies`] if it has cookie lines but none parse.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_cookie_jar(path: &Path) -> Result<Arc<Jar>, CookieError> {
    let io_error = |source| CookieError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_error)?;
    let parsed = parse_cookie_lines(BufReader::new(file)).map_err(io_error)?;

    if parsed.cookies.is_empty() && !parsed.skipped_lines.is_empty() {
        return Err(CookieError::NoCookies {
            path: path.display().to_string(),
            skipped: parsed.skipped_lines.len(),
        });
    }

    info!(
        cookies = parsed.cookies.len(),
        skipped = parsed.skipped_lines.len(),
        "loaded cookie file"
    );
    Ok(cookie_jar(&parsed.cookies))
}
