//! Media reference extraction from result page content.
//!
//! Extraction is a pluggable capability: each [`UrlExtractor`] recognises one
//! media kind in unescaped page HTML and returns the URLs it found. An
//! [`ExtractorSet`] combines the extractors enabled for a session and tags
//! every match with its kind and origin page.
//!
//! # Example
//!
//! ```
//! use search_downloader::extract::{ExtractorSet, MediaKind};
//! use search_downloader::session::MediaFlags;
//!
//! let set = ExtractorSet::from_flags(MediaFlags::default());
//! let html = r#"<img src="https://64.media.tumblr.com/abc/tumblr_x_1280.jpg">"#;
//! let found = set.extract(html, 3);
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].kind, MediaKind::Photo);
//! assert_eq!(found[0].page, 3);
//! ```

mod generic;
mod tumblr;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub use generic::GenericExtractor;
pub use tumblr::{TumblrAudioExtractor, TumblrPhotoExtractor, TumblrVideoExtractor};

use crate::session::MediaFlags;

/// Kind of downloadable media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
}

impl MediaKind {
    /// All kinds, in reporting order.
    pub const ALL: [Self; 3] = [Self::Photo, Self::Video, Self::Audio];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered downloadable item. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaReference {
    /// Source URL; also the item's identity for duplicate accounting.
    pub url: String,
    pub kind: MediaKind,
    /// Result page the reference was found on.
    pub page: u32,
}

impl MediaReference {
    #[must_use]
    pub fn new(url: impl Into<String>, kind: MediaKind, page: u32) -> Self {
        Self {
            url: url.into(),
            kind,
            page,
        }
    }
}

/// Recognises one kind of media reference in page content.
pub trait UrlExtractor: Send + Sync {
    /// Kind assigned to every match.
    fn kind(&self) -> MediaKind;

    /// Returns every match in `content`, in document order, repeats included.
    fn extract(&self, content: &str) -> Vec<String>;
}

/// The extractors enabled for one session.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn UrlExtractor>>,
}

impl fmt::Debug for ExtractorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<MediaKind> = self.extractors.iter().map(|e| e.kind()).collect();
        f.debug_struct("ExtractorSet").field("kinds", &kinds).finish()
    }
}

impl ExtractorSet {
    /// Builds a set from explicit extractors.
    #[must_use]
    pub fn new(extractors: Vec<Box<dyn UrlExtractor>>) -> Self {
        Self { extractors }
    }

    /// Builds the default site extractors for each enabled kind, followed by
    /// the generic pattern pass where requested.
    #[must_use]
    pub fn from_flags(flags: MediaFlags) -> Self {
        let mut extractors: Vec<Box<dyn UrlExtractor>> = Vec::new();

        if flags.photo {
            extractors.push(Box::new(TumblrPhotoExtractor));
            if flags.generic_photo {
                extractors.push(Box::new(GenericExtractor::new(MediaKind::Photo)));
            }
        }
        if flags.video {
            extractors.push(Box::new(TumblrVideoExtractor));
            if flags.generic_video {
                extractors.push(Box::new(GenericExtractor::new(MediaKind::Video)));
            }
        }
        if flags.audio {
            extractors.push(Box::new(TumblrAudioExtractor));
            if flags.generic_audio {
                extractors.push(Box::new(GenericExtractor::new(MediaKind::Audio)));
            }
        }

        Self { extractors }
    }

    /// Runs every extractor over `content` and tags matches with `page`.
    #[must_use]
    pub fn extract(&self, content: &str, page: u32) -> Vec<MediaReference> {
        let mut found = Vec::new();
        for extractor in &self.extractors {
            let kind = extractor.kind();
            for url in extractor.extract(content) {
                trace!(page, %kind, url = %url, "found media reference");
                found.push(MediaReference::new(url, kind, page));
            }
        }
        found
    }
}
