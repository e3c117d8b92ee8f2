use serde::{Deserialize, Serialize};

/// Items per page on every public listing.
pub const PAGE_SIZE: i64 = 12;

/// Where a requested page number lands once clamped to the available pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub per_page: i64,
}

impl PageWindow {
    /// Missing or non-numeric input gives page 1, below-range input gives the
    /// first page and beyond-range input gives the last one. There is always at
    /// least one (possibly empty) page.
    pub fn resolve(requested: Option<&str>, total: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let num_pages = ((total.max(0) + per_page - 1) / per_page).max(1);

        let number = match requested.and_then(|raw| raw.trim().parse::<i64>().ok()) {
            None => 1,
            Some(n) => n.clamp(1, num_pages),
        };

        Self {
            number,
            num_pages,
            per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: i64) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            number: 1,
            num_pages: 1,
            total: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> i64 {
        (self.number + 1).min(self.num_pages)
    }

    pub fn prev_number(&self) -> i64 {
        (self.number - 1).max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
