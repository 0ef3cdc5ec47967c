//! Monthly spending reports.
//!
//! Only splits and payments count as spending; loans and refunds move money
//! without consuming it, and cancelled transactions never happened.

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{
    accumulate, checked_total, convert_to_inr, Currency, SpendingCategory, SpendingReport,
    SpendingTrends, Transaction, TransactionFilter, TransactionStatus, TransactionType, UserId,
    MAX_PAGE_LIMIT,
};
use crate::repositories::{SpendingReportRepository, TransactionRepository};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Name and display color of a spending category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLabel {
    pub name: String,
    pub color: String,
}

impl CategoryLabel {
    fn new(name: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
        }
    }
}

/// Assigns a transaction to a spending category
pub trait Categorizer: Send + Sync {
    fn categorize(&self, tx: &Transaction) -> CategoryLabel;
}

struct KeywordRule {
    label: CategoryLabel,
    keywords: Vec<String>,
}

/// Matches lowercase keywords against title and description; first rule wins
pub struct KeywordCategorizer {
    rules: Vec<KeywordRule>,
    fallback: CategoryLabel,
}

impl KeywordCategorizer {
    pub fn new(fallback: CategoryLabel) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn with_rule(mut self, label: CategoryLabel, keywords: &[&str]) -> Self {
        self.rules.push(KeywordRule {
            label,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        });
        self
    }
}

impl Default for KeywordCategorizer {
    fn default() -> Self {
        Self::new(CategoryLabel::new("Other", "#C7C7CC"))
            .with_rule(
                CategoryLabel::new("Food", "#FF6B6B"),
                &[
                    "food", "dinner", "lunch", "breakfast", "restaurant", "cafe", "coffee",
                    "pizza", "grocer", "snack", "meal", "swiggy", "zomato",
                ],
            )
            .with_rule(
                CategoryLabel::new("Transport", "#4ECDC4"),
                &[
                    "uber", "ola", "taxi", "cab", "fuel", "petrol", "train", "flight", "bus",
                    "metro", "parking", "toll",
                ],
            )
            .with_rule(
                CategoryLabel::new("Shopping", "#45B7D1"),
                &["shopping", "amazon", "flipkart", "clothes", "mall", "gift", "store"],
            )
            .with_rule(
                CategoryLabel::new("Bills", "#96CEB4"),
                &[
                    "bill", "rent", "electricity", "water", "internet", "wifi", "recharge",
                    "utilities", "maintenance",
                ],
            )
            .with_rule(
                CategoryLabel::new("Entertainment", "#FFEEAD"),
                &["movie", "netflix", "concert", "game", "party", "spotify", "ticket"],
            )
    }
}

impl Categorizer for KeywordCategorizer {
    fn categorize(&self, tx: &Transaction) -> CategoryLabel {
        let text = format!(
            "{} {}",
            tx.title.to_lowercase(),
            tx.description.as_deref().unwrap_or_default().to_lowercase()
        );

        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|rule| rule.label.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Whether a transaction counts towards monthly spending
pub fn counts_as_spending(tx: &Transaction) -> bool {
    tx.status != TransactionStatus::Cancelled
        && matches!(
            tx.transaction_type,
            TransactionType::Split | TransactionType::Payment
        )
}

/// First instant of the month in UTC
fn month_start(year: i32, month: u32) -> AppResult<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::Validation(format!("Invalid report period {}-{:02}", year, month)))
}

fn next_month(year: i32, month: u32) -> AppResult<(i32, u32)> {
    if month == 12 {
        year.checked_add(1)
            .map(|next| (next, 1))
            .ok_or_else(|| out_of_range(year))
    } else {
        Ok((year, month + 1))
    }
}

fn previous_month(year: i32, month: u32) -> AppResult<(i32, u32)> {
    if month == 1 {
        year.checked_sub(1)
            .map(|prev| (prev, 12))
            .ok_or_else(|| out_of_range(year))
    } else {
        Ok((year, month - 1))
    }
}

fn out_of_range(year: i32) -> AppError {
    AppError::Validation(format!("Report year {} is out of range", year))
}

/// Build the ordered category list for a set of spending transactions
pub fn categorize_spending(
    categorizer: &dyn Categorizer,
    transactions: &[Transaction],
) -> AppResult<(Decimal, Vec<SpendingCategory>)> {
    let mut buckets: BTreeMap<String, (Decimal, String)> = BTreeMap::new();

    for tx in transactions {
        let label = categorizer.categorize(tx);
        let entry = buckets
            .entry(label.name)
            .or_insert((Decimal::ZERO, label.color));
        accumulate(&mut entry.0, convert_to_inr(tx.amount, tx.currency)?)?;
    }

    let total = checked_total(buckets.values().map(|(amount, _)| *amount))?;

    let mut categories = buckets
        .into_iter()
        .map(|(name, (amount, color))| {
            Ok(SpendingCategory {
                percentage: percentage_of(amount, total)?,
                name,
                amount,
                color,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    categories.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.name.cmp(&b.name)));

    Ok((total, categories))
}

/// `part` as a percentage of `base`, two decimals; zero when `base` is zero
fn percentage_of(part: Decimal, base: Decimal) -> AppResult<Decimal> {
    if base.is_zero() {
        return Ok(Decimal::ZERO);
    }
    part.checked_div(base)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp(2))
        .ok_or_else(|| AppError::Validation(format!("{} relative to {} is out of range", part, base)))
}

pub struct SpendingReportAggregator {
    transactions: Arc<dyn TransactionRepository>,
    reports: Arc<dyn SpendingReportRepository>,
    categorizer: Arc<dyn Categorizer>,
    clock: Arc<dyn Clock>,
}

impl SpendingReportAggregator {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        reports: Arc<dyn SpendingReportRepository>,
        categorizer: Arc<dyn Categorizer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transactions,
            reports,
            categorizer,
            clock,
        }
    }

    /// Recompute and store the report for (user, year, month)
    pub async fn generate(&self, user_id: &UserId, year: i32, month: u32) -> AppResult<SpendingReport> {
        if !(1..=12).contains(&month) {
            return Err(AppError::Validation(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }

        let spending = self.spending_in(user_id, year, month).await?;
        let (total_spent, categories) = categorize_spending(self.categorizer.as_ref(), &spending)?;

        let (prev_year, prev_month) = previous_month(year, month)?;
        let previous = self.spending_in(user_id, prev_year, prev_month).await?;
        let previous_total = checked_total(
            previous
                .iter()
                .map(|tx| convert_to_inr(tx.amount, tx.currency))
                .collect::<AppResult<Vec<_>>>()?,
        )?;

        // Both totals are non-negative, so the difference cannot overflow
        let change_percentage = percentage_of(total_spent - previous_total, previous_total)?;

        let trends = serde_json::to_value(SpendingTrends {
            transaction_count: spending.len(),
            previous_month_total: previous_total,
            change_percentage,
            top_category: categories.first().map(|c| c.name.clone()),
        })?;

        let report = SpendingReport {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            year,
            month,
            total_spent,
            currency: Currency::Inr,
            categories,
            trends,
            created_at: self.clock.now(),
        };

        let stored = self.reports.upsert(&report).await?;
        info!(
            "Generated spending report {}-{:02} for {}: {} INR",
            year, month, user_id, stored.total_spent
        );
        Ok(stored)
    }

    pub async fn get(&self, user_id: &UserId, year: i32, month: u32) -> AppResult<SpendingReport> {
        self.reports
            .find(user_id, year, month)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Spending report {}-{:02} for {} not found",
                    year, month, user_id
                ))
            })
    }

    /// Stored reports, most recent period first
    pub async fn list(
        &self,
        user_id: &UserId,
        year: Option<i32>,
        limit: i64,
    ) -> AppResult<Vec<SpendingReport>> {
        if !(0..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 0 and {}, got {}",
                MAX_PAGE_LIMIT, limit
            )));
        }
        Ok(self.reports.list(user_id, year, limit).await?)
    }

    /// The user's counted spending created within the given month
    async fn spending_in(&self, user_id: &UserId, year: i32, month: u32) -> AppResult<Vec<Transaction>> {
        let (next_year, next_month) = next_month(year, month)?;
        let filter = TransactionFilter {
            user_id: Some(user_id.clone()),
            created_from: Some(month_start(year, month)?),
            created_before: Some(month_start(next_year, next_month)?),
            ..Default::default()
        };

        let mut transactions = self.transactions.find(&filter, None).await?;
        transactions.retain(counts_as_spending);
        Ok(transactions)
    }
}
