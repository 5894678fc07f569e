// src/models/pagination.rs

use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 200;

pub(crate) const fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

/// One page of a listing plus the size of the whole result set.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}
