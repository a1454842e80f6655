//! Pagination types for windowed query and search results.

use serde::{Deserialize, Serialize};

/// A single page of results plus the total match count.
///
/// `count` always reflects the full match set independent of the pagination
/// window, so callers can compute total pages from any page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The records contained in this page.
    pub items: Vec<T>,
    /// Total count of matching records across all pages.
    pub count: u64,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// A pagination cursor: 1-indexed page number and positive page size.
///
/// Translates deterministically to a skip/limit window:
/// `offset = per_page * (page - 1)`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of records per page.
    pub per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Number of records to skip for this page.
    pub fn offset(&self) -> usize {
        self.per_page * (self.page.saturating_sub(1))
    }

    /// Wraps a windowed result set into a [`Page`] with navigation metadata.
    ///
    /// `count` is the total match count, independent of the window.
    pub fn to_page<T>(&self, count: u64, items: Vec<T>) -> Page<T> {
        Page {
            items,
            count,
            next_page: if (self.offset() + self.per_page) < count as usize {
                Some(self.page + 1)
            } else {
                None
            },
            previous_page: if self.page > 1 { Some(self.page - 1) } else { None },
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, per_page: 50 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_zero_offset() {
        assert_eq!(PageRequest::new(1, 50).offset(), 0);
    }

    #[test]
    fn offset_is_per_page_times_page_minus_one() {
        assert_eq!(PageRequest::new(2, 10).offset(), 10);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
        assert_eq!(PageRequest::new(7, 1).offset(), 6);
    }

    #[test]
    fn to_page_computes_navigation() {
        let request = PageRequest::new(2, 10);
        let page = request.to_page(35, vec![(); 10]);

        assert_eq!(page.count, 35);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
    }

    #[test]
    fn last_page_has_no_next() {
        let request = PageRequest::new(4, 10);
        let page = request.to_page(35, vec![(); 5]);

        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(3));
    }

    #[test]
    fn single_page_has_no_navigation() {
        let page = PageRequest::new(1, 50).to_page(7, vec![(); 7]);

        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, None);
    }
}
