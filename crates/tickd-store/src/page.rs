//! Pagination contract shared by the job and log list surfaces.

use serde::{Deserialize, Serialize};

/// A page request. Both fields are 1-based and clamped to at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page_num: u64,
    /// Rows per page.
    pub page_size: u64,
}

impl PageRequest {
    /// Create a page request, clamping both fields to at least 1.
    pub fn new(page_num: u64, page_size: u64) -> Self {
        Self {
            page_num: page_num.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Row offset of the first row on this page.
    pub fn offset(&self) -> u64 {
        (self.page_num - 1) * self.page_size
    }

    /// Row limit for this page.
    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The rows on this page.
    pub rows: Vec<T>,
    /// Total number of matching rows across all pages.
    pub total: u64,
    /// Whether a later page exists: `ceil(total / page_size) > page_num`.
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Assemble a page from its rows and the total match count.
    pub fn new(rows: Vec<T>, total: u64, request: PageRequest) -> Self {
        let has_next = total.div_ceil(request.page_size) > request.page_num;
        Self {
            rows,
            total,
            has_next,
        }
    }
}
