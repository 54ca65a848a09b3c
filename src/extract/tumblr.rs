//! Extractors for media hosted on the search source's own CDN.

use std::sync::LazyLock;

use regex::Regex;

use super::{MediaKind, UrlExtractor};

#[allow(clippy::expect_used)]
static PHOTO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://(?:\d+\.)?media\.tumblr\.com/[^\s"'<>]+?\.(?:jpe?g|png|gif|webp)\b"#)
        .expect("photo regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static VIDEO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://(?:vtt|vt|ve)\.(?:media\.)?tumblr\.com/[^\s"'<>]+?\.mp4\b"#)
        .expect("video regex is valid") // Static pattern, safe to panic
});

/// Inline player links: `.../video_file/<token>/<post id>/tumblr_<id>`.
#[allow(clippy::expect_used)]
static INLINE_VIDEO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://(?:www\.)?tumblr\.com/video_file/[^\s"'<>]*?/(tumblr_[A-Za-z0-9]+)"#)
        .expect("inline video regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static AUDIO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://a\.tumblr\.com/[A-Za-z0-9_]+\.(?:mp3|m4a|ogg)\b"#)
        .expect("audio regex is valid") // Static pattern, safe to panic
});

/// Host used when rewriting inline video ids to direct file URLs.
const VIDEO_HOST: &str = "https://vt.media.tumblr.com";

/// `true` if the site extractor for `kind` already collects `url`.
pub(super) fn is_site_media(kind: MediaKind, url: &str) -> bool {
    match kind {
        MediaKind::Photo => PHOTO_PATTERN.is_match(url),
        MediaKind::Video => VIDEO_PATTERN.is_match(url),
        MediaKind::Audio => AUDIO_PATTERN.is_match(url),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TumblrPhotoExtractor;

impl UrlExtractor for TumblrPhotoExtractor {
    fn kind(&self) -> MediaKind {
        MediaKind::Photo
    }

    fn extract(&self, content: &str) -> Vec<String> {
        PHOTO_PATTERN
            .find_iter(content)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Direct video files plus inline player links rewritten to direct files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TumblrVideoExtractor;

impl UrlExtractor for TumblrVideoExtractor {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn extract(&self, content: &str) -> Vec<String> {
        let direct = VIDEO_PATTERN
            .find_iter(content)
            .map(|m| m.as_str().to_string());
        let inline = INLINE_VIDEO_PATTERN
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|id| format!("{VIDEO_HOST}/{}.mp4", id.as_str()));
        direct.chain(inline).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TumblrAudioExtractor;

impl UrlExtractor for TumblrAudioExtractor {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn extract(&self, content: &str) -> Vec<String> {
        AUDIO_PATTERN
            .find_iter(content)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
