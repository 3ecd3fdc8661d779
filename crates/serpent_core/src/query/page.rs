//! Paginated result envelope and page-number arithmetic.

use serde::Serialize;

/// One page of records plus navigation metadata.
///
/// `next` and `previous` are 1-based page numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedList<T> {
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
    pub data: Vec<T>,
    pub next: Option<u64>,
    pub previous: Option<u64>,
}

impl<T> PaginatedList<T> {
    /// Assembles a page; `limit = None` means pagination was disabled.
    pub fn new(data: Vec<T>, total: u64, skip: u64, limit: Option<u64>) -> Self {
        let (next, previous) = page_numbers(skip, limit, total);
        Self {
            total,
            skip,
            limit: limit.unwrap_or(total),
            data,
            next,
            previous,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedList<U> {
        PaginatedList {
            total: self.total,
            skip: self.skip,
            limit: self.limit,
            data: self.data.into_iter().map(f).collect(),
            next: self.next,
            previous: self.previous,
        }
    }
}

/// Returns `(next, previous)` page numbers.
///
/// Callers reject `limit = Some(0)` before reaching here; it yields no pages.
pub fn page_numbers(skip: u64, limit: Option<u64>, total: u64) -> (Option<u64>, Option<u64>) {
    let Some(limit) = limit.filter(|limit| *limit > 0) else {
        return (None, None);
    };

    let next = (skip.saturating_add(limit) < total).then(|| (skip + limit) / limit + 1);

    let previous = (skip > 0).then(|| {
        let (skip, limit) = (to_signed(skip), to_signed(limit));
        let page = (skip - limit).div_euclid(limit) + 1;
        u64::try_from(page.max(1)).unwrap_or(1)
    });

    (next, previous)
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
