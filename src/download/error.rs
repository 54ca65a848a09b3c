//! Error types for persisting media items.

use std::path::PathBuf;

use thiserror::Error;

/// Errors a [`MediaSink`](super::MediaSink) reports for a single item.
///
/// A sink error ends only that item; the drain loop carries on.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timeout downloading {url}")]
    Timeout { url: String },

    #[error("HTTP {status} downloading {url}")]
    HttpStatus { url: String, status: u16 },

    /// File system error while writing the item.
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Catch-all for custom sinks.
    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// Classifies a reqwest error, separating timeouts from other failures.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path() {
        let error = SinkError::io(
            "/tmp/out/a.jpg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = error.to_string();
        assert!(msg.contains("/tmp/out/a.jpg"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_http_status_display() {
        let error = SinkError::HttpStatus {
            url: "https://x.test/a.jpg".to_string(),
            status: 404,
        };
        assert_eq!(error.to_string(), "HTTP 404 downloading https://x.test/a.jpg");
    }
}
