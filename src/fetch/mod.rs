//! Search source requests: the bootstrap session key and paginated result pages.
//!
//! The crawler depends only on the [`SessionKeyFetcher`] and [`PageFetcher`]
//! traits; [`SearchClient`] is the reqwest-backed implementation of both.
//!
//! # Request shape
//!
//! Page `p` of target `t` with page size `s` is a form POST to
//! `{base}/search/{t}/post_page/{p}` whose body carries
//! `num_posts_shown` and `before` offsets of `(p - 1) * s`. Every page
//! request carries the session key in the `X-tumblr-form-key` header.

mod client;
mod envelope;
mod error;

use async_trait::async_trait;

pub use client::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BASE_URL, READ_TIMEOUT_SECS, SESSION_KEY_HEADER, SearchClient,
    extract_session_key,
};
pub use envelope::{posts_fragment, unescape_fragment};
pub use error::FetchError;

/// One result page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub target: &'a str,
    pub page: u32,
    pub page_size: u32,
    pub session_key: &'a str,
}

impl PageRequest<'_> {
    /// Offset of the first post on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// URL-encoded form body for this page.
    ///
    /// ```
    /// use search_downloader::fetch::PageRequest;
    ///
    /// let request = PageRequest { target: "old cars", page: 3, page_size: 20, session_key: "k" };
    /// let body = request.form_body();
    /// assert!(body.starts_with("q=old%20cars&sort=top"));
    /// assert!(body.contains("&num_posts_shown=40&before=40&"));
    /// assert!(body.contains("&post_page=3&"));
    /// ```
    #[must_use]
    pub fn form_body(&self) -> String {
        let offset = self.offset();
        format!(
            "q={query}&sort=top&post_view=masonry&num_posts_shown={offset}&before={offset}\
             &safe_mode=false&post_page={page}&filter_nsfw=false&filter_post_type=\
             &next_ad_offset=0&ad_placement_id=0&more_posts=true",
            query = urlencoding::encode(self.target),
            page = self.page,
        )
    }
}

/// Obtains the transient form key required by page requests.
#[async_trait]
pub trait SessionKeyFetcher: Send + Sync {
    /// Fetches the bootstrap page for `target` and extracts its key.
    ///
    /// # Errors
    ///
    /// Any error here is fatal to the session.
    async fn fetch_session_key(&self, target: &str) -> Result<String, FetchError>;
}

/// Issues one paginated search request.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the raw response body of one result page.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] when the request times out, other
    /// variants for transport or status failures.
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<String, FetchError>;
}
