//! Error types for search page requests.

use thiserror::Error;

/// Errors from the bootstrap key request or a result page request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before the response was read.
    #[error("timeout requesting {url}")]
    Timeout { url: String },

    /// Non-success HTTP status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus { url: String, status: u16 },

    /// Response body was not the expected JSON envelope.
    #[error("malformed search response from page {page}: {source}")]
    Envelope {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    /// Bootstrap page carried no form key.
    #[error("no session key found on {url}")]
    MissingSessionKey { url: String },

    /// Base URL could not be joined with the request path.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Request was abandoned because the crawl was cancelled.
    #[error("request for page {page} cancelled")]
    Cancelled { page: u32 },
}

impl FetchError {
    /// Classifies a reqwest error, separating timeouts from other failures.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Returns `true` for request timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_and_classification() {
        let error = FetchError::Timeout {
            url: "https://example.com/search/cars/post_page/2".to_string(),
        };
        assert!(error.is_timeout());
        assert!(error.to_string().contains("post_page/2"));
    }

    #[test]
    fn test_http_status_is_not_timeout() {
        let error = FetchError::http_status("https://example.com", 503);
        assert!(!error.is_timeout());
        assert_eq!(error.to_string(), "HTTP 503 requesting https://example.com");
    }

    #[test]
    fn test_envelope_error_mentions_page() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = FetchError::Envelope { page: 4, source };
        assert!(error.to_string().contains("page 4"));
    }
}
