//! Fixed-size paging over ordered collections.
//!
//! Page numbers are 1-based. A request outside `1..=num_pages` is clamped to
//! the nearest valid page and an unparsable one falls back to page 1, so
//! listing handlers never fail because of the `page` query parameter.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The raw `?page=` query parameter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<String>,
}

impl PageParams {
    pub fn number(number: i64) -> Self {
        Self {
            page: Some(number.to_string()),
        }
    }

    /// The page the client asked for, before clamping.
    pub fn requested(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    /// An empty collection still has one (empty) page.
    pub fn num_pages(&self) -> usize {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    pub fn clamp(&self, requested: i64) -> usize {
        let last = self.num_pages() as i64;
        requested.clamp(1, last) as usize
    }

    /// Row offset and limit for a page that has already been clamped.
    pub fn window(&self, number: usize) -> (usize, usize) {
        ((number - 1) * self.per_page, self.per_page)
    }

    /// Clamps `params` and fetches the matching slice through `fetch`, which
    /// receives `(offset, limit)`.
    pub fn page<T, F>(&self, params: &PageParams, fetch: F) -> Result<Page<T>>
    where
        F: FnOnce(usize, usize) -> Result<Vec<T>>,
    {
        let number = self.clamp(params.requested());
        let (offset, limit) = self.window(number);
        let items = if self.count == 0 {
            Vec::new()
        } else {
            fetch(offset, limit)?
        };
        let num_pages = self.num_pages();
        Ok(Page {
            items,
            number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
            has_previous: number > 1,
            has_next: number < num_pages,
            previous_page_number: (number > 1).then(|| number - 1),
            next_page_number: (number < num_pages).then(|| number + 1),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<usize>,
    pub next_page_number: Option<usize>,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
            has_previous: self.has_previous,
            has_next: self.has_next,
            previous_page_number: self.previous_page_number,
            next_page_number: self.next_page_number,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(total: usize, per_page: usize, requested: &str) -> Page<usize> {
        let items: Vec<usize> = (0..total).collect();
        let params = PageParams {
            page: Some(requested.to_string()),
        };
        Paginator::new(total, per_page)
            .page(&params, |offset, limit| {
                Ok(items.iter().copied().skip(offset).take(limit).collect())
            })
            .expect("page")
    }

    #[test]
    fn last_page_holds_the_remainder() {
        let page = page_of(13, 10, "2");
        assert_eq!(page.number, 2);
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.items, vec![10, 11, 12]);
        assert!(page.has_previous);
        assert!(!page.has_next);
    }

    #[test]
    fn evenly_divisible_last_page_is_full() {
        let page = page_of(20, 10, "2");
        assert_eq!(page.len(), 10);
        assert_eq!(page.num_pages, 2);
    }

    #[test]
    fn out_of_range_pages_clamp_to_nearest() {
        assert_eq!(page_of(13, 10, "99").number, 2);
        assert_eq!(page_of(13, 10, "0").number, 1);
        assert_eq!(page_of(13, 10, "-4").number, 1);
    }

    #[test]
    fn garbage_page_means_first_page() {
        let page = page_of(13, 10, "last");
        assert_eq!(page.number, 1);
        assert_eq!(page.next_page_number, Some(2));
    }

    #[test]
    fn empty_collection_has_one_empty_page() {
        let page = page_of(0, 10, "3");
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
        assert_eq!(page.count, 0);
    }

    #[test]
    fn missing_parameter_defaults_to_one() {
        assert_eq!(PageParams::default().requested(), 1);
        assert_eq!(PageParams::number(3).requested(), 3);
    }
}
