//! Persistence helpers over the sea-orm entities.
//!
//! Every function is generic over [`sea_orm::ConnectionTrait`] so the same
//! call works against the pool or inside an open `DatabaseTransaction`.

pub mod inspection_repository;
pub mod transaction_repository;
pub mod vehicle_repository;

/// Normalised page request, `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Clamps raw values: `page < 1` becomes 1, a `limit` outside
    /// `1..=max_limit` falls back to `default_limit`.
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64, max_limit: u64) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .filter(|l| (1..=max_limit).contains(l))
            .unwrap_or(default_limit);
        Self { page, limit }
    }

    /// Rows skipped before this page, saturating for absurd page numbers.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        (total + self.limit - 1) / self.limit
    }
}
