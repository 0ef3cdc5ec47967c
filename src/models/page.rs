use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Largest page a caller may request in one call
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Offset/limit window applied after filtering and sorting.
///
/// Bounds are checked on construction and on deserialization, so a `Page`
/// always holds `skip >= 0` and `0 <= limit <= MAX_PAGE_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PageBounds")]
pub struct Page {
    skip: i64,
    limit: i64,
}

/// Unchecked wire form of a `Page`
#[derive(Deserialize)]
struct PageBounds {
    skip: i64,
    limit: i64,
}

impl TryFrom<PageBounds> for Page {
    type Error = AppError;

    fn try_from(raw: PageBounds) -> AppResult<Self> {
        Page::new(raw.skip, raw.limit)
    }
}

impl Page {
    /// Validate raw pagination bounds coming from the caller
    pub fn new(skip: i64, limit: i64) -> AppResult<Self> {
        if skip < 0 {
            return Err(AppError::Validation(format!("skip must be >= 0, got {}", skip)));
        }
        if limit < 0 {
            return Err(AppError::Validation(format!("limit must be >= 0, got {}", limit)));
        }
        if limit > MAX_PAGE_LIMIT {
            return Err(AppError::Validation(format!(
                "limit must be <= {}, got {}",
                MAX_PAGE_LIMIT, limit
            )));
        }
        Ok(Self { skip, limit })
    }

    pub fn first(limit: i64) -> AppResult<Self> {
        Self::new(0, limit)
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Slice an already sorted in-memory result set
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(0))
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}
