//! Host-agnostic extraction by file extension.

use std::sync::LazyLock;

use regex::Regex;

use super::tumblr::is_site_media;
use super::{MediaKind, UrlExtractor};

#[allow(clippy::expect_used)]
static GENERIC_PHOTO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.(?:jpe?g|png|gif|webp|bmp)\b"#)
        .expect("generic photo regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static GENERIC_VIDEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.(?:mp4|webm|mkv|mov|m4v)\b"#)
        .expect("generic video regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static GENERIC_AUDIO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>]+\.(?:mp3|m4a|ogg|oga|flac|wav)\b"#)
        .expect("generic audio regex is valid") // Static pattern, safe to panic
});

/// Matches any http(s) URL ending in a file extension of its kind.
///
/// URLs the site extractor of the same kind collects are left out, so a
/// site file is recorded once even with the generic pass enabled.
#[derive(Debug, Clone, Copy)]
pub struct GenericExtractor {
    kind: MediaKind,
}

impl GenericExtractor {
    #[must_use]
    pub fn new(kind: MediaKind) -> Self {
        Self { kind }
    }

    fn pattern(&self) -> &'static Regex {
        match self.kind {
            MediaKind::Photo => &GENERIC_PHOTO,
            MediaKind::Video => &GENERIC_VIDEO,
            MediaKind::Audio => &GENERIC_AUDIO,
        }
    }
}

impl UrlExtractor for GenericExtractor {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn extract(&self, content: &str) -> Vec<String> {
        self.pattern()
            .find_iter(content)
            .map(|m| m.as_str())
            .filter(|url| !is_site_media(self.kind, url))
            .map(str::to_string)
            .collect()
    }
}
