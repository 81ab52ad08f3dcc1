use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
/// Highest page any listing serves; larger requests read as this page.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// Page selection taken from `?limit=&page=`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

fn default_page() -> i64 {
    1
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { limit: DEFAULT_LIMIT, page: 1 }
    }
}

impl PageRequest {
    /// Clamps limit into `1..=MAX_LIMIT` and page into `1..=MAX_PAGE`.
    pub fn normalized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            page: self.page.clamp(1, MAX_PAGE),
        }
    }

    /// Rows to skip. Saturates instead of overflowing on unnormalized input.
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit).max(0)
    }
}

/// Pagination metadata returned next to list payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub total_data: i64,
}

impl Metadata {
    pub fn new(page: PageRequest, total_data: i64) -> Self {
        let total_pages = if total_data == 0 {
            0
        } else {
            (total_data + page.limit - 1) / page.limit
        };
        Self {
            page: page.page,
            limit: page.limit,
            total_pages,
            total_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_rounds_pages_up() {
        let page = PageRequest { limit: 10, page: 2 };
        let meta = Metadata::new(page, 21);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.total_data, 21);
        assert_eq!(page.offset(), 10);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        assert_eq!(Metadata::new(PageRequest::default(), 0).total_pages, 0);
    }

    #[test]
    fn normalization_clamps_bad_input() {
        let page = PageRequest { limit: 0, page: -3 }.normalized();
        assert_eq!(page, PageRequest { limit: 1, page: 1 });
        assert_eq!(PageRequest { limit: 5000, page: 1 }.normalized().limit, MAX_LIMIT);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = PageRequest { limit: MAX_LIMIT, page: i64::MAX }.normalized();
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);
        assert_eq!(PageRequest { limit: 10, page: i64::MAX }.offset(), i64::MAX);
        assert_eq!(PageRequest { limit: 10, page: i64::MIN }.offset(), 0);
    }
}
