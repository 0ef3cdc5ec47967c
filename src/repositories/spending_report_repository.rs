//! Repository for monthly spending reports

use super::{parse_column, RepoResult};
use crate::error::RepositoryError;
use crate::models::{SpendingCategory, SpendingReport, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[async_trait]
pub trait SpendingReportRepository: Send + Sync {
    /// Insert or replace the report for (user, year, month). A replaced report
    /// keeps its original id; the stored record is returned.
    async fn upsert(&self, report: &SpendingReport) -> RepoResult<SpendingReport>;

    async fn find(&self, user_id: &UserId, year: i32, month: u32)
        -> RepoResult<Option<SpendingReport>>;

    /// Newest period first, at most `limit` entries
    async fn list(
        &self,
        user_id: &UserId,
        year: Option<i32>,
        limit: i64,
    ) -> RepoResult<Vec<SpendingReport>>;
}

const REPORT_COLUMNS: &str =
    "id, user_id, year, month, total_spent, currency, categories, trends, created_at";

#[derive(Debug, FromRow)]
struct SpendingReportRow {
    id: Uuid,
    user_id: String,
    year: i32,
    month: i32,
    total_spent: Decimal,
    currency: String,
    categories: Json<Vec<SpendingCategory>>,
    trends: Json<Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SpendingReportRow> for SpendingReport {
    type Error = RepositoryError;

    fn try_from(row: SpendingReportRow) -> Result<Self, Self::Error> {
        let month = u32::try_from(row.month)
            .map_err(|_| RepositoryError::Corrupt(format!("spending_reports.month: {}", row.month)))?;

        Ok(SpendingReport {
            id: row.id,
            user_id: UserId::from(row.user_id),
            year: row.year,
            month,
            total_spent: row.total_spent,
            currency: parse_column(&row.currency, "spending_reports.currency")?,
            categories: row.categories.0,
            trends: row.trends.0,
            created_at: row.created_at,
        })
    }
}

pub struct PgSpendingReportRepository {
    pool: PgPool,
}

impl PgSpendingReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SpendingReportRepository for PgSpendingReportRepository {
    async fn upsert(&self, report: &SpendingReport) -> RepoResult<SpendingReport> {
        let row = sqlx::query_as::<_, SpendingReportRow>(&format!(
            r#"
            INSERT INTO spending_reports (id, user_id, year, month, total_spent, currency, categories, trends, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, year, month) DO UPDATE
            SET total_spent = EXCLUDED.total_spent,
                currency = EXCLUDED.currency,
                categories = EXCLUDED.categories,
                trends = EXCLUDED.trends,
                created_at = EXCLUDED.created_at
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(report.id)
        .bind(report.user_id.as_str())
        .bind(report.year)
        .bind(report.month as i32)
        .bind(report.total_spent)
        .bind(report.currency.as_str())
        .bind(Json(&report.categories))
        .bind(Json(&report.trends))
        .bind(report.created_at)
        .fetch_one(&self.pool)
        .await?;

        SpendingReport::try_from(row)
    }

    async fn find(
        &self,
        user_id: &UserId,
        year: i32,
        month: u32,
    ) -> RepoResult<Option<SpendingReport>> {
        let row = sqlx::query_as::<_, SpendingReportRow>(&format!(
            "SELECT {} FROM spending_reports WHERE user_id = $1 AND year = $2 AND month = $3",
            REPORT_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(year)
        .bind(month as i32)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SpendingReport::try_from).transpose()
    }

    async fn list(
        &self,
        user_id: &UserId,
        year: Option<i32>,
        limit: i64,
    ) -> RepoResult<Vec<SpendingReport>> {
        let rows = sqlx::query_as::<_, SpendingReportRow>(&format!(
            r#"
            SELECT {}
            FROM spending_reports
            WHERE user_id = $1 AND ($2::INTEGER IS NULL OR year = $2)
            ORDER BY year DESC, month DESC
            LIMIT $3
            "#,
            REPORT_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(year)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SpendingReport::try_from).collect()
    }
}
