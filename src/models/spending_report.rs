use super::{Currency, UserId};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One slice of a monthly spending breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingCategory {
    pub name: String,
    pub amount: Decimal,
    pub percentage: Decimal,
    pub color: String,
}

/// Month-over-month figures stored in a report's `trends` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingTrends {
    pub transaction_count: usize,
    pub previous_month_total: Decimal,
    pub change_percentage: Decimal,
    pub top_category: Option<String>,
}

/// Monthly spending summary for one user, keyed by (user, year, month)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingReport {
    pub id: Uuid,
    pub user_id: UserId,
    pub year: i32,
    pub month: u32,
    pub total_spent: Decimal,
    pub currency: Currency,
    pub categories: Vec<SpendingCategory>,
    pub trends: Value,
    pub created_at: DateTime<Utc>,
}

impl SpendingReport {
    /// Compare everything except identity and generation time
    pub fn same_figures(&self, other: &SpendingReport) -> bool {
        self.user_id == other.user_id
            && self.year == other.year
            && self.month == other.month
            && self.total_spent == other.total_spent
            && self.currency == other.currency
            && self.categories == other.categories
            && self.trends == other.trends
    }

    /// Typed view of `trends`
    pub fn trend_summary(&self) -> AppResult<SpendingTrends> {
        Ok(serde_json::from_value(self.trends.clone())?)
    }

    /// Sort key: newest period first
    pub fn period(&self) -> (i32, u32) {
        (self.year, self.month)
    }
}
