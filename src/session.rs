//! Crawl session description: target, paging, and media feature flags.
//!
//! A [`Session`] is built once by the caller and shared read-only with every
//! crawl chain. Progress counters live elsewhere ([`crate::stats`]), so the
//! session itself never changes while a crawl is running.

use thiserror::Error;

/// Default number of posts per result page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest number of pages an explicit selection may name.
pub const MAX_SELECTED_PAGES: usize = 100_000;

/// Errors produced while parsing an explicit page selection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageSelectionError {
    /// A list entry was not a positive integer or `start-end` range.
    #[error("invalid page entry '{entry}': expected a positive number or range like 3-7")]
    InvalidEntry {
        /// The offending list entry.
        entry: String,
    },

    /// A range was written backwards (`7-3`).
    #[error("invalid page range {start}-{end}: start must not exceed end")]
    ReversedRange {
        /// Range start.
        start: u32,
        /// Range end.
        end: u32,
    },

    /// The selection string contained no pages at all.
    #[error("page selection is empty")]
    Empty,

    /// The selection names more pages than [`MAX_SELECTED_PAGES`].
    #[error("page selection names more than {max} pages")]
    TooManyPages {
        /// The enforced maximum.
        max: usize,
    },
}

/// How page numbers are assigned to crawl chains.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageSelection {
    /// Crawl from page 1 until the source stops returning results.
    #[default]
    OpenEnded,
    /// Crawl exactly these pages, once each, without self-advancing.
    Explicit(Vec<u32>),
}

impl PageSelection {
    /// Parses a comma-separated list of pages and inclusive ranges.
    ///
    /// The result is sorted and free of repeats.
    ///
    /// ```
    /// use search_downloader::session::PageSelection;
    ///
    /// let selection = PageSelection::parse("7, 2-4,4").unwrap();
    /// assert_eq!(selection, PageSelection::Explicit(vec![2, 3, 4, 7]));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PageSelectionError`] for non-numeric entries, zero, reversed
    /// ranges, an empty list, or more than [`MAX_SELECTED_PAGES`] pages.
    pub fn parse(raw: &str) -> Result<Self, PageSelectionError> {
        let mut pages = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if let Some((start, end)) = entry.split_once('-') {
                let start = parse_page(start, entry)?;
                let end = parse_page(end, entry)?;
                if start > end {
                    return Err(PageSelectionError::ReversedRange { start, end });
                }
                let width = usize::try_from(end - start).map_or(usize::MAX, |w| w.saturating_add(1));
                if width > MAX_SELECTED_PAGES.saturating_sub(pages.len()) {
                    return Err(PageSelectionError::TooManyPages {
                        max: MAX_SELECTED_PAGES,
                    });
                }
                pages.extend(start..=end);
            } else {
                if pages.len() >= MAX_SELECTED_PAGES {
                    return Err(PageSelectionError::TooManyPages {
                        max: MAX_SELECTED_PAGES,
                    });
                }
                pages.push(parse_page(entry, entry)?);
            }
        }

        pages.sort_unstable();
        pages.dedup();
        let selection = Self::Explicit(pages);
        selection.validate()?;
        Ok(selection)
    }

    /// Checks an explicit list: non-empty, no page zero, at most
    /// [`MAX_SELECTED_PAGES`] entries. Open-ended selections always pass.
    ///
    /// # Errors
    ///
    /// Returns the first [`PageSelectionError`] the list violates.
    pub fn validate(&self) -> Result<(), PageSelectionError> {
        let Self::Explicit(pages) = self else {
            return Ok(());
        };
        if pages.is_empty() {
            return Err(PageSelectionError::Empty);
        }
        if pages.len() > MAX_SELECTED_PAGES {
            return Err(PageSelectionError::TooManyPages {
                max: MAX_SELECTED_PAGES,
            });
        }
        if pages.contains(&0) {
            return Err(PageSelectionError::InvalidEntry {
                entry: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Returns `true` for an explicit page list.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }

    /// Page numbers handed out to chains when the crawl starts.
    ///
    /// Open-ended crawls seed one chain per residue class (`1..=concurrency`);
    /// explicit selections hand out every listed page.
    #[must_use]
    pub fn initial_pages(&self, concurrency: usize) -> Vec<u32> {
        match self {
            Self::OpenEnded => {
                let upper = u32::try_from(concurrency).unwrap_or(u32::MAX);
                (1..=upper).collect()
            }
            Self::Explicit(pages) => pages.clone(),
        }
    }
}

fn parse_page(raw: &str, entry: &str) -> Result<u32, PageSelectionError> {
    match raw.trim().parse::<u32>() {
        Ok(page) if page > 0 => Ok(page),
        _ => Err(PageSelectionError::InvalidEntry {
            entry: entry.to_string(),
        }),
    }
}

/// Which media kinds are collected, and whether the generic pattern pass runs
/// for each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct MediaFlags {
    pub photo: bool,
    pub video: bool,
    pub audio: bool,
    pub generic_photo: bool,
    pub generic_video: bool,
    pub generic_audio: bool,
}

impl Default for MediaFlags {
    fn default() -> Self {
        Self {
            photo: true,
            video: true,
            audio: true,
            generic_photo: false,
            generic_video: false,
            generic_audio: false,
        }
    }
}

/// One crawl run for a named search target.
#[derive(Debug, Clone)]
pub struct Session {
    /// Search term / source name.
    pub target: String,
    /// Posts per result page, used to derive paging offsets.
    pub page_size: u32,
    /// Open-ended pagination or an explicit page list.
    pub pages: PageSelection,
    /// Media kinds to collect.
    pub media: MediaFlags,
    /// Gate every page request through the shared API rate limiter.
    pub limit_api: bool,
}

impl Session {
    /// Creates an open-ended session with default paging and media flags.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            page_size: DEFAULT_PAGE_SIZE,
            pages: PageSelection::OpenEnded,
            media: MediaFlags::default(),
            limit_api: false,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: MediaFlags) -> Self {
        self.media = media;
        self
    }

    #[must_use]
    pub fn with_api_limit(mut self, limit_api: bool) -> Self {
        self.limit_api = limit_api;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_pages_and_ranges() {
        let selection = PageSelection::parse("2,4,7").unwrap();
        assert_eq!(selection, PageSelection::Explicit(vec![2, 4, 7]));

        let selection = PageSelection::parse("5-7, 1").unwrap();
        assert_eq!(selection, PageSelection::Explicit(vec![1, 5, 6, 7]));
    }

    #[test]
    fn test_parse_removes_repeats() {
        let selection = PageSelection::parse("3,1-3,3").unwrap();
        assert_eq!(selection, PageSelection::Explicit(vec![1, 2, 3]));
    }

    #[test]
    fn test_parse_rejects_zero_and_garbage() {
        assert!(matches!(
            PageSelection::parse("0"),
            Err(PageSelectionError::InvalidEntry { .. })
        ));
        assert!(matches!(
            PageSelection::parse("abc"),
            Err(PageSelectionError::InvalidEntry { .. })
        ));
        assert!(matches!(
            PageSelection::parse("1-x"),
            Err(PageSelectionError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_reversed_range() {
        assert_eq!(
            PageSelection::parse("9-3"),
            Err(PageSelectionError::ReversedRange { start: 9, end: 3 })
        );
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(PageSelection::parse(" , "), Err(PageSelectionError::Empty));
    }

    #[test]
    fn test_parse_rejects_huge_range_without_expanding_it() {
        let max = MAX_SELECTED_PAGES;
        assert_eq!(
            PageSelection::parse("1-4000000000"),
            Err(PageSelectionError::TooManyPages { max })
        );
        assert_eq!(
            PageSelection::parse(&format!("1-{max},{}", max + 1)),
            Err(PageSelectionError::TooManyPages { max })
        );
        let at_limit = PageSelection::parse(&format!("1-{max}")).unwrap();
        assert_eq!(at_limit.initial_pages(1).len(), max);
    }

    #[test]
    fn test_validate_checks_explicit_lists_only() {
        assert_eq!(PageSelection::OpenEnded.validate(), Ok(()));
        assert_eq!(PageSelection::Explicit(vec![1, 2]).validate(), Ok(()));
        assert_eq!(
            PageSelection::Explicit(vec![]).validate(),
            Err(PageSelectionError::Empty)
        );
        assert!(matches!(
            PageSelection::Explicit(vec![0, 3]).validate(),
            Err(PageSelectionError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_open_ended_initial_pages_cover_each_residue_once() {
        let pages = PageSelection::OpenEnded.initial_pages(3);
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn test_explicit_initial_pages_are_the_list() {
        let pages = PageSelection::Explicit(vec![2, 4, 7]).initial_pages(3);
        assert_eq!(pages, vec![2, 4, 7]);
    }

    #[test]
    fn test_session_builder_defaults() {
        let session = Session::new("cars");
        assert_eq!(session.target, "cars");
        assert_eq!(session.page_size, DEFAULT_PAGE_SIZE);
        assert!(!session.pages.is_explicit());
        assert!(session.media.photo);
        assert!(!session.media.generic_photo);
        assert!(!session.limit_api);
    }
}
