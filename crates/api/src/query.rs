//! Shared query parameter types for API handlers.

use serde::Deserialize;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Limit clamped to `0..=MAX_LIMIT`, defaulting to `DEFAULT_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT)
    }

    /// Offset, never negative.
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_bounds() {
        let params = PaginationParams::default();
        assert_eq!((params.limit(), params.offset()), (10, 0));

        let params = PaginationParams {
            limit: Some(1000),
            offset: Some(-5),
        };
        assert_eq!((params.limit(), params.offset()), (100, 0));

        let params = PaginationParams {
            limit: Some(-1),
            offset: Some(20),
        };
        assert_eq!((params.limit(), params.offset()), (0, 20));
    }
}
