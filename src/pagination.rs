use serde::{Deserialize, Serialize};

/// Texts shown per list page.
pub const TEXTS_PER_PAGE: u64 = 10;
/// Image thumbnails shown per list page.
pub const IMAGES_PER_PAGE: u64 = 24;

/// Query parameters accepted by the list views.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Optional tag name filter.
    pub tag: Option<String>,
    /// Raw page number; anything unparsable falls back to the first page.
    pub page: Option<String>,
}

/// Splits `count` items into fixed-size pages.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: u64,
    per_page: u64,
}

impl Paginator {
    pub fn new(count: u64, per_page: u64) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    /// Number of pages; an empty result set still has one (empty) page.
    pub fn num_pages(&self) -> u64 {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    /// Pick a page from a raw query value.
    ///
    /// Missing or non-numeric values select the first page; numbers below one
    /// or past the end select the last page.
    pub fn get_page(&self, raw: Option<&str>) -> PageWindow {
        let last = self.num_pages();
        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n < 1 => last,
            Some(Ok(n)) => (n as u64).min(last),
        };
        PageWindow {
            number,
            num_pages: last,
            count: self.count,
            per_page: self.per_page,
        }
    }
}

/// The slice of the result set a page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
}

impl PageWindow {
    /// Items to skip before this page.
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.per_page
    }

    /// Items on this page.
    pub fn len(&self) -> u64 {
        self.count
            .saturating_sub(self.offset())
            .min(self.per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One page of results as handed to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u64>,
    pub previous_page_number: Option<u64>,
    /// 1-based index of the first item on the page, 0 when empty.
    pub start_index: u64,
    /// 1-based index of the last item on the page, 0 when empty.
    pub end_index: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;
        let (start_index, end_index) = if window.is_empty() {
            (0, 0)
        } else {
            (window.offset() + 1, window.offset() + window.len())
        };
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then_some(window.number - 1),
            start_index,
            end_index,
        }
    }
}
