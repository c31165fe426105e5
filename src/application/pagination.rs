//! Windowed page-number pagination.
//!
//! Every list view shows dedicated links to the first and last page plus a
//! window of `delta` neighbours on each side of the current page, so the
//! window is computed as `from_page = max(page - delta, 2)` and
//! `to_page = min(page + delta, total_pages - 1)`: pages 1 and `total_pages`
//! are excluded from the window by construction.

use serde::Deserialize;
use thiserror::Error;

/// Upper bound accepted for a configured page size.
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page size must be between 1 and {MAX_PER_PAGE}")]
    InvalidPerPage,
}

/// Lenient `?page=` query parameter.
///
/// Anything that does not parse as a positive integer falls back to the
/// first page; values beyond the last page clamp to the last page.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn requested(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|number| *number >= 1)
            .unwrap_or(1)
    }
}

/// Counts-only paginator: knows the total, the page size and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    total_items: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(total_items: u64, per_page: u32) -> Result<Self, PaginationError> {
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(PaginationError::InvalidPerPage);
        }
        Ok(Self {
            total_items,
            per_page,
        })
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of pages; an empty sequence still has one (empty) page.
    pub fn total_pages(&self) -> u32 {
        let pages = self.total_items.div_ceil(u64::from(self.per_page));
        u32::try_from(pages.max(1)).unwrap_or(u32::MAX)
    }

    /// Resolve a requested page number, clamping out-of-range values to the
    /// nearest valid page.
    pub fn get_page(&self, requested: u32) -> Page {
        let number = requested.clamp(1, self.total_pages());
        Page {
            number,
            paginator: *self,
        }
    }
}

/// A resolved page within a [`Paginator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u32,
    paginator: Paginator,
}

impl Page {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn total_pages(&self) -> u32 {
        self.paginator.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages()
    }

    /// SQL offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.paginator.per_page)
    }

    /// SQL limit for this page.
    pub fn limit(&self) -> u32 {
        self.paginator.per_page
    }

    /// Number of items that actually fall on this page.
    pub fn item_count(&self) -> u64 {
        let remaining = self.paginator.total_items.saturating_sub(self.offset());
        remaining.min(u64::from(self.paginator.per_page))
    }

    /// Compute the navigation window with `delta` neighbours per side.
    ///
    /// The window never includes page 1 or the last page; when
    /// `from_page > to_page` there are no intermediate links to render.
    pub fn window(&self, delta: u32) -> PageWindow {
        let total_pages = self.total_pages();
        let from_page = self.number.saturating_sub(delta).max(2);
        let to_page = self
            .number
            .saturating_add(delta)
            .min(total_pages.saturating_sub(1));

        PageWindow {
            number: self.number,
            total_pages,
            from_page,
            to_page,
            has_previous: self.has_previous(),
            has_next: self.has_next(),
        }
    }
}

/// The contiguous range of page numbers shown as navigation links around the
/// current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub total_pages: u32,
    pub from_page: u32,
    pub to_page: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageWindow {
    /// Page numbers inside the window, in order. Empty when the window is
    /// degenerate (two pages or fewer).
    pub fn pages(&self) -> Vec<u32> {
        if self.from_page > self.to_page {
            Vec::new()
        } else {
            (self.from_page..=self.to_page).collect()
        }
    }

    /// Whether an ellipsis gap exists between page 1 and the window start.
    pub fn gap_before(&self) -> bool {
        self.from_page > 2
    }

    /// Whether an ellipsis gap exists between the window end and the last page.
    pub fn gap_after(&self) -> bool {
        self.to_page + 1 < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(total_items: u64, per_page: u32, requested: u32) -> Page {
        Paginator::new(total_items, per_page)
            .expect("paginator")
            .get_page(requested)
    }

    #[test]
    fn rejects_zero_and_oversized_page_sizes() {
        assert_eq!(Paginator::new(10, 0), Err(PaginationError::InvalidPerPage));
        assert_eq!(
            Paginator::new(10, 101),
            Err(PaginationError::InvalidPerPage)
        );
    }

    #[test]
    fn empty_sequence_still_has_one_page() {
        let page = page(0, 10, 1);
        assert_eq!(page.number(), 1);
        assert_eq!(page.total_pages(), 1);
        assert_eq!(page.item_count(), 0);
        assert!(!page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn out_of_range_requests_clamp() {
        assert_eq!(page(23, 10, 0).number(), 1);
        assert_eq!(page(23, 10, 99).number(), 3);
    }

    #[test]
    fn twenty_three_items_make_three_pages() {
        let paginator = Paginator::new(23, 10).expect("paginator");
        assert_eq!(paginator.total_pages(), 3);
        assert_eq!(paginator.get_page(3).item_count(), 3);
        assert_eq!(paginator.get_page(3).offset(), 20);
        assert_eq!(paginator.get_page(1).item_count(), 10);
    }

    #[test]
    fn window_on_first_page_with_delta_one() {
        let window = page(23, 10, 1).window(1);
        assert_eq!(window.from_page, 2);
        assert_eq!(window.to_page, 2);
        assert_eq!(window.pages(), vec![2]);
        assert!(!window.gap_before());
        assert!(!window.gap_after());
    }

    #[test]
    fn window_excludes_first_and_last_page() {
        // 100 pages, somewhere in the middle.
        let window = page(1000, 10, 50).window(5);
        assert_eq!(window.from_page, 45);
        assert_eq!(window.to_page, 55);
        assert!(window.gap_before());
        assert!(window.gap_after());

        // Window clipped at both edges.
        let near_start = page(1000, 10, 2).window(5);
        assert_eq!(near_start.from_page, 2);
        let near_end = page(1000, 10, 99).window(5);
        assert_eq!(near_end.to_page, 99);
    }

    #[test]
    fn single_page_has_empty_window() {
        let window = page(4, 10, 1).window(5);
        assert!(window.from_page > window.to_page);
        assert!(window.pages().is_empty());
    }

    #[test]
    fn window_bounds_hold_for_all_inputs() {
        for total_items in 0..120_u64 {
            for requested in 1..16_u32 {
                for delta in 1..6_u32 {
                    let page = page(total_items, 10, requested);
                    let window = page.window(delta);
                    let total_pages = page.total_pages();

                    assert!(window.from_page >= 2);
                    assert!(window.to_page <= total_pages.saturating_sub(1));
                    if total_pages > delta * 2 + 2 {
                        assert!(
                            window.from_page <= window.to_page,
                            "degenerate window for total_items={total_items} \
                             requested={requested} delta={delta}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn page_query_is_lenient() {
        let query = |raw: Option<&str>| PageQuery {
            page: raw.map(str::to_string),
        };
        assert_eq!(query(None).requested(), 1);
        assert_eq!(query(Some("0")).requested(), 1);
        assert_eq!(query(Some("junk")).requested(), 1);
        assert_eq!(query(Some("-3")).requested(), 1);
        assert_eq!(query(Some("7")).requested(), 7);
    }
}
