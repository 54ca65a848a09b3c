//! reqwest-backed search client.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, instrument};
use url::Url;

use super::{FetchError, PageFetcher, PageRequest, SessionKeyFetcher};

/// Default search host.
pub const DEFAULT_BASE_URL: &str = "https://www.tumblr.com";

/// Header carrying the session key on every page request.
pub const SESSION_KEY_HEADER: &str = "X-tumblr-form-key";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-request timeout (60 seconds).
pub const READ_TIMEOUT_SECS: u64 = 60;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

#[allow(clippy::expect_used)]
static SESSION_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"id=["']tumblr_form_key["'][^>]*?content=["']([^"']+)["']"#)
        .expect("session key regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static SESSION_KEY_PATTERN_REVERSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"content=["']([^"']+)["'][^>]*?id=["']tumblr_form_key["']"#)
        .expect("session key regex is valid") // Static pattern, safe to panic
});

/// Pulls the form key out of the bootstrap page's `tumblr_form_key` meta tag.
///
/// ```
/// use search_downloader::fetch::extract_session_key;
///
/// let html = r#"<meta name="tumblr-form-key" id="tumblr_form_key" content="!1231abc">"#;
/// assert_eq!(extract_session_key(html).as_deref(), Some("!1231abc"));
/// assert_eq!(extract_session_key("<html></html>"), None);
/// ```
#[must_use]
pub fn extract_session_key(html: &str) -> Option<String> {
    SESSION_KEY_PATTERN
        .captures(html)
        .or_else(|| SESSION_KEY_PATTERN_REVERSED.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|key| key.as_str().to_string())
}

fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("search-downloader/{version}")
}

/// HTTP client for the search source.
///
/// Create once per session and share; cloning is cheap and reuses the
/// connection pool.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    base_url: Url,
}

impl SearchClient {
    /// Creates a client for `base_url` with default timeouts and no cookies.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] for an unparseable base URL, or
    /// [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Self::build(base_url, None, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client that sends the cookies in `jar` with every request.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    #[instrument(level = "debug", skip(cookie_jar))]
    pub fn with_cookie_jar(base_url: &str, cookie_jar: Arc<Jar>) -> Result<Self, FetchError> {
        Self::build(
            base_url,
            Some(cookie_jar),
            CONNECT_TIMEOUT_SECS,
            READ_TIMEOUT_SECS,
        )
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn build(
        base_url: &str,
        cookie_jar: Option<Arc<Jar>>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|_| FetchError::InvalidUrl {
            url: base_url.to_string(),
        })?;

        let mut builder: ClientBuilder = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent());
        if let Some(jar) = cookie_jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder.build().map_err(FetchError::Client)?;

        debug!(base_url = %base_url, "created search client");
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/search/{target}`: bootstrap page and referer for page requests.
    fn search_url(&self, target: &str) -> Result<Url, FetchError> {
        let path = format!("search/{}", urlencoding::encode(target));
        self.base_url
            .join(&path)
            .map_err(|_| FetchError::InvalidUrl { url: path })
    }

    fn page_url(&self, target: &str, page: u32) -> Result<Url, FetchError> {
        let path = format!("search/{}/post_page/{page}", urlencoding::encode(target));
        self.base_url
            .join(&path)
            .map_err(|_| FetchError::InvalidUrl { url: path })
    }
}

#[async_trait]
impl SessionKeyFetcher for SearchClient {
    #[instrument(skip(self))]
    async fn fetch_session_key(&self, target: &str) -> Result<String, FetchError> {
        let url = self.search_url(target)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url.as_str(), status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let key = extract_session_key(&html).ok_or_else(|| FetchError::MissingSessionKey {
            url: url.to_string(),
        })?;
        debug!(key_len = key.len(), "acquired session key");
        Ok(key)
    }
}

#[async_trait]
impl PageFetcher for SearchClient {
    #[instrument(skip(self, request), fields(target = %request.target, page = request.page))]
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<String, FetchError> {
        let url = self.page_url(request.target, request.page)?;
        let referer = self.search_url(request.target)?;

        let response = self
            .client
            .post(url.clone())
            .header(SESSION_KEY_HEADER, request.session_key)
            .header("DNT", "1")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(REFERER, referer.as_str())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(request.form_body())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url.as_str(), status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))
    }
}
