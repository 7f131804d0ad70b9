pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One page of a list: 1-based `page` and a fixed `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub size: u32,
}

impl PageWindow {
    /// Absent, non-numeric and non-positive pages all mean page 1.
    pub fn from_param(raw: Option<&str>, size: u32) -> Self {
        let page = raw
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(1);
        Self {
            page,
            size: size.max(1),
        }
    }

    pub fn skip(&self) -> u64 {
        self.size as u64 * (self.page as u64 - 1)
    }

    pub fn take(&self) -> u32 {
        self.size
    }

    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.size as u64)
    }

    /// Rows this page holds when the full result has `total` rows.
    #[cfg(test)]
    pub fn expected_rows(&self, total: u64) -> u64 {
        total.saturating_sub(self.skip()).min(self.size as u64)
    }
}
