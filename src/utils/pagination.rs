use crate::error::{Error, Result};

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// `page` is 1-based and must be positive; `per_page` is clamped to
    /// `1..=MAX_PER_PAGE`.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(Error::InvalidArgument(format!(
                "page must be at least 1, got {}",
                page
            )));
        }
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        if (page - 1).checked_mul(per_page).is_none() {
            return Err(Error::InvalidArgument(format!(
                "page {} is out of range",
                page
            )));
        }
        Ok(Self { page, per_page })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        ((total as f64) / (self.per_page as f64)).ceil() as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}
