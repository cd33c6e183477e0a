use serde::Serialize;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized page request: 1-based page, size within `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Missing or zero values fall back to page 1 and `default_size`.
    pub fn new(page: Option<u32>, size: Option<u32>, default_size: u32) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let size = size
            .filter(|s| *s > 0)
            .unwrap_or(default_size)
            .min(MAX_PAGE_SIZE);
        Self { page, size }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub request: PageRequest,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        total_pages(self.total, self.request.size)
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.request.page,
            page_size: self.request.size,
            total: self.total,
            total_pages: self.total_pages(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            request: self.request,
            total: self.total,
        }
    }
}

pub fn total_pages(total: u64, size: u32) -> u64 {
    if size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(size))
}
