use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Server-side window over the lead list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginationState {
    #[serde(default)]
    pub total: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    DEFAULT_PAGE_LIMIT
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            total: 0,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl PaginationState {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn current_page(&self) -> u64 {
        if self.limit == 0 {
            return 1;
        }
        self.offset / self.limit + 1
    }

    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit)
    }

    pub fn has_more(&self) -> bool {
        self.offset + self.limit < self.total
    }

    /// Moves the window to a 1-based page; page 0 is treated as page 1.
    pub fn go_to_page(&mut self, page: u64) {
        self.offset = page.max(1).saturating_sub(1).saturating_mul(self.limit);
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Page numbers within `radius` of the current page, clamped to the
    /// available pages.
    pub fn page_window(&self, radius: u64) -> Vec<u64> {
        let total_pages = self.total_pages();
        if total_pages == 0 {
            return Vec::new();
        }
        let current = self.current_page().min(total_pages);
        let start = current.saturating_sub(radius).max(1);
        let end = (current + radius).min(total_pages);
        (start..=end).collect()
    }

    /// 1-based inclusive range of rows shown, e.g. `(101, 200)`.
    /// `(0, 0)` when there is nothing to show.
    pub fn display_range(&self) -> (u64, u64) {
        if self.total == 0 || self.offset >= self.total {
            return (0, 0);
        }
        let start = self.offset + 1;
        let end = (self.offset + self.limit).min(self.total);
        (start, end)
    }
}

/// Returns the 1-based `page` of `items`. Page 0 is treated as page 1 and
/// a zero `page_size` yields an empty slice.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page_size == 0 {
        return &[];
    }
    let start = page.max(1).saturating_sub(1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
