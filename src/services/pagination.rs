//! Offset pagination over Xray listings and batching of Xray writes.

use std::slice::Chunks;

use crate::models::PageParams;

/// Maximum items Xray returns per listing request.
pub const PAGE_SIZE: usize = 100;

/// Maximum status updates sent in one Xray mutation.
pub const WRITE_BATCH_SIZE: usize = 25;

/// Walks an offset-paginated listing until the reported total is reached.
#[derive(Debug, Clone)]
pub struct PageCursor {
    start: usize,
    page_size: usize,
    page_index: usize,
}

impl PageCursor {
    pub fn new(page_size: usize) -> Self {
        PageCursor {
            start: 0,
            page_size: page_size.max(1),
            page_index: 0,
        }
    }

    /// Parameters for the page to fetch next.
    pub fn params(&self) -> PageParams {
        PageParams {
            start: self.start,
            limit: self.page_size,
        }
    }

    /// Zero-based index of the page to fetch next.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Move past the current page. Returns `false` once `total` items are covered.
    pub fn advance(&mut self, total: usize) -> bool {
        self.start += self.page_size;
        self.page_index += 1;
        self.start < total
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

/// Split writes into batches of at most `size`.
pub fn batches<T>(items: &[T], size: usize) -> Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// Proactive token refresh every `every` pages.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSchedule {
    every: usize,
}

impl RefreshSchedule {
    /// `every == 0` disables refreshing.
    pub fn new(every: usize) -> Self {
        RefreshSchedule { every }
    }

    /// Whether to refresh after finishing the page with this index.
    pub fn due_after(&self, page_index: usize) -> bool {
        self.every > 0 && page_index > 0 && page_index % self.every == 0
    }
}
