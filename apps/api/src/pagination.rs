use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;

pub const JOBS_PAGE_SIZE: u32 = 15;
pub const APPLICATIONS_PAGE_SIZE: u32 = 15;
pub const ORGANIZATIONS_PAGE_SIZE: u32 = 20;
pub const MEMBERS_PAGE_SIZE: u32 = 20;

pub const X_TOTAL_COUNT: &str = "x-total-count";
pub const X_TOTAL_PAGES: &str = "x-total-pages";

/// `?page=N` query parameter, 1-based. Missing or zero means page 1.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(query: PageQuery, size: u32) -> Self {
        Page {
            number: query.page.unwrap_or(1).max(1),
            size,
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }
}

pub fn total_pages(total: i64, size: u32) -> i64 {
    if total <= 0 {
        return 0;
    }
    (total + i64::from(size) - 1) / i64::from(size)
}

/// `X-Total-Count` / `X-Total-Pages` response headers for list endpoints.
pub fn paging_headers(total: i64, size: u32) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&total.to_string()) {
        headers.insert(X_TOTAL_COUNT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&total_pages(total, size).to_string()) {
        headers.insert(X_TOTAL_PAGES, value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let page = Page::new(PageQuery { page: None }, JOBS_PAGE_SIZE);
        assert_eq!(page.number, 1);
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit(), 15);
    }

    #[test]
    fn page_zero_is_clamped_to_one() {
        let page = Page::new(PageQuery { page: Some(0) }, JOBS_PAGE_SIZE);
        assert_eq!(page.number, 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn offset_scales_with_page_number() {
        let page = Page::new(PageQuery { page: Some(3) }, ORGANIZATIONS_PAGE_SIZE);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 15), 0);
        assert_eq!(total_pages(1, 15), 1);
        assert_eq!(total_pages(15, 15), 1);
        assert_eq!(total_pages(16, 15), 2);
        assert_eq!(total_pages(45, 15), 3);
    }

    #[test]
    fn headers_carry_count_and_pages() {
        let headers = paging_headers(31, 15);
        assert_eq!(headers.get(X_TOTAL_COUNT).unwrap(), "31");
        assert_eq!(headers.get(X_TOTAL_PAGES).unwrap(), "3");
    }
}
