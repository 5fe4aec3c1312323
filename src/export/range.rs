use std::fmt;
use std::ops::RangeInclusive;

use super::ExportError;

/// Contiguous, inclusive range of zero-based page indices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportRange {
    start: usize,
    end: usize,
}

impl ExportRange {
    /// Window of `max_pages` pages whose last page is `current_page`.
    ///
    /// `current_page` past the end is pulled back to the last page and a
    /// window of zero is widened to one page.
    pub fn ending_at(
        current_page: usize,
        max_pages: usize,
        page_count: usize,
    ) -> Result<Self, ExportError> {
        if page_count == 0 {
            return Err(ExportError::EmptyDocument);
        }
        let end = current_page.min(page_count - 1);
        let start = end.saturating_sub(max_pages.max(1) - 1);
        Ok(Self { start, end })
    }

    /// Clamp an arbitrary interval to `[0, page_count - 1]`
    pub fn clamped(start: i64, end: i64, page_count: usize) -> Result<Self, ExportError> {
        if page_count == 0 {
            return Err(ExportError::EmptyDocument);
        }
        if start > end {
            return Err(ExportError::InvalidRange { start, end });
        }
        let last = page_count as i64 - 1;
        let start = start.clamp(0, last) as usize;
        let end = end.clamp(0, last) as usize;
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    #[expect(clippy::len_without_is_empty, reason = "A range always holds a page")]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        (self.start..=self.end).contains(&page)
    }

    #[must_use]
    pub fn pages(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl fmt::Display for ExportRange {
    /// One-based, as shown to users
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "page {}", self.start + 1)
        } else {
            write!(f, "pages {}-{}", self.start + 1, self.end + 1)
        }
    }
}
