//! Session-level crawl errors.
//!
//! Only failures that abort a whole session live here. Chain-scoped and
//! item-scoped failures are logged where they happen and never surface as a
//! [`CrawlError`].

use thiserror::Error;

use crate::fetch::FetchError;
use crate::session::PageSelectionError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// No session key, so no page can be requested.
    #[error("failed to obtain session key for '{target}': {source}")]
    SessionKey {
        target: String,
        #[source]
        source: FetchError,
    },

    #[error("concurrency must be between 1 and 100, got {value}")]
    InvalidConcurrency { value: usize },

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(#[from] PageSelectionError),

    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_error_names_target() {
        let error = CrawlError::SessionKey {
            target: "cars".to_string(),
            source: FetchError::MissingSessionKey {
                url: "https://example.com/search/cars".to_string(),
            },
        };
        let msg = error.to_string();
        assert!(msg.contains("'cars'"));
        assert!(msg.contains("no session key"));
    }

    #[test]
    fn test_invalid_concurrency_display() {
        let error = CrawlError::InvalidConcurrency { value: 0 };
        assert_eq!(error.to_string(), "concurrency must be between 1 and 100, got 0");
    }
}
