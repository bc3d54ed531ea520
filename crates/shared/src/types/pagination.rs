//! Paging for ledger list queries.
//!
//! Obligation and settlement listings are ordered newest first and read one
//! page at a time. Page sizes are clamped to [`MAX_PER_PAGE`].

use serde::{Deserialize, Serialize};

/// Largest page a list query will return.
pub const MAX_PER_PAGE: u32 = 200;

/// Page requested by a caller. Pages are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number; `0` is read as the first page.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Rows per page; clamped to `1..=MAX_PER_PAGE`.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    /// Builds a request, normalizing out-of-range values.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }.normalized()
    }

    /// Same request with the page at least 1 and the size inside the cap.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Rows to skip. Computed in `u64` so large page numbers cannot overflow.
    #[must_use]
    pub fn offset(&self) -> u64 {
        let normalized = self.normalized();
        u64::from(normalized.page - 1) * u64::from(normalized.per_page)
    }

    /// Rows to fetch.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.normalized().per_page)
    }
}

/// One page of a ledger listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// Rows on this page.
    pub data: Vec<T>,
    /// Where the page sits in the full result.
    pub meta: PageMeta,
}

/// Position of a page inside the full result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Page number actually served.
    pub page: u32,
    /// Page size actually used.
    pub per_page: u32,
    /// Matching rows across all pages.
    pub total: u64,
    /// Number of pages, at least 1.
    pub total_pages: u32,
}

impl PageMeta {
    /// Returns true if a later page holds more rows.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

impl<T> PageResponse<T> {
    /// Wraps the rows fetched for `request` out of `total` matches.
    #[must_use]
    pub fn new(data: Vec<T>, request: &PageRequest, total: u64) -> Self {
        let request = request.normalized();
        let total_pages = if total == 0 {
            1
        } else {
            u32::try_from(total.div_ceil(u64::from(request.per_page))).unwrap_or(u32::MAX)
        };

        Self {
            data,
            meta: PageMeta {
                page: request.page,
                per_page: request.per_page,
                total,
                total_pages,
            },
        }
    }
}
