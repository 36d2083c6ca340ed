//! Page-at-a-time view over a table with a "21-23 of 23" summary.

use serde::{Deserialize, Serialize};

/// Paging cursor over a fixed-size item list.
///
/// Invariant: `1 <= current_page <= page_count()`, with `current_page == 1` when empty.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct PageState {
    pub page_size: usize,
    pub current_page: usize,
    pub total_items: usize,
}

impl PageState {
    pub fn page_count(&self) -> usize {
        self.total_items.div_ceil(self.page_size)
    }
}

/// 1-based inclusive position of the visible page, `{0, 0, 0}` when empty.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct PaginationSummary {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

impl std::fmt::Display for PaginationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} of {}", self.start, self.end, self.total)
    }
}

/// Client-side pagination of a fully loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedTable<T> {
    items: Vec<T>,
    state: PageState,
}

impl<T> PaginatedTable<T> {
    /// Zero page sizes are clamped to one.
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            state: PageState {
                page_size: page_size.max(1),
                current_page: 1,
                total_items: 0,
            },
        }
    }

    /// Replace the items. The current page survives if it still exists, otherwise page 1.
    pub fn set_data(&mut self, items: Vec<T>) {
        self.items = items;
        self.state.total_items = self.items.len();
        if self.state.current_page > self.state.page_count().max(1) {
            self.state.current_page = 1;
        }
    }

    /// Advance one page. Returns `false` on the last page.
    pub fn next_page(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.state.current_page += 1;
        true
    }

    /// Go back one page. Returns `false` on the first page.
    pub fn prev_page(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.state.current_page -= 1;
        true
    }

    pub fn has_prev(&self) -> bool {
        self.state.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.state.current_page < self.state.page_count()
    }

    pub fn page_slice(&self) -> &[T] {
        let (start, end) = self.bounds();
        &self.items[start..end]
    }

    pub fn pagination_summary(&self) -> PaginationSummary {
        let (start, end) = self.bounds();
        if start == end {
            return PaginationSummary::default();
        }
        PaginationSummary {
            start: start + 1,
            end,
            total: self.state.total_items,
        }
    }

    /// Item at `index` within the visible page.
    pub fn item_on_page(&self, index: usize) -> Option<&T> {
        self.page_slice().get(index)
    }

    pub fn page_count(&self) -> usize {
        self.state.page_count()
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn bounds(&self) -> (usize, usize) {
        let start = ((self.state.current_page - 1) * self.state.page_size).min(self.items.len());
        let end = (start + self.state.page_size).min(self.items.len());
        (start, end)
    }
}
