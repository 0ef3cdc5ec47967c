//! Repository for balance records

use super::{parse_column, RepoResult};
use crate::error::RepositoryError;
use crate::models::{AdjustOutcome, Balance, BalanceFilter, BalanceUpdate, Currency, Page, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

#[async_trait]
pub trait BalanceRepository: Send + Sync {
    async fn insert(&self, balance: &Balance) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Balance>>;

    /// Matching balances, most recently active first (ties broken by id desc)
    async fn find(&self, filter: &BalanceFilter, page: Option<Page>) -> RepoResult<Vec<Balance>>;

    /// Merge `update` into the stored record; `None` if the id is unknown
    async fn update(
        &self,
        id: Uuid,
        update: &BalanceUpdate,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Balance>>;

    async fn delete(&self, id: Uuid) -> RepoResult<bool>;

    /// Atomically add `delta` to the oldest balance of (user, currency).
    ///
    /// When no balance exists a positive delta opens one, anything else is
    /// rejected without writing. Concurrent calls for the same pair never
    /// lose an update.
    async fn increment_or_insert(
        &self,
        user_id: &UserId,
        currency: Currency,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> RepoResult<AdjustOutcome>;
}

const BALANCE_COLUMNS: &str =
    "id, user_id, name, avatar, amount, currency, last_activity, created_at, updated_at";

#[derive(Debug, FromRow)]
struct BalanceRow {
    id: Uuid,
    user_id: String,
    name: String,
    avatar: String,
    amount: Decimal,
    currency: String,
    last_activity: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BalanceRow> for Balance {
    type Error = RepositoryError;

    fn try_from(row: BalanceRow) -> Result<Self, Self::Error> {
        Ok(Balance {
            id: row.id,
            user_id: UserId::from(row.user_id),
            name: row.name,
            avatar: row.avatar,
            amount: row.amount,
            currency: parse_column(&row.currency, "balances.currency")?,
            last_activity: row.last_activity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgBalanceRepository {
    pool: PgPool,
}

impl PgBalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_with<'e, E>(executor: E, balance: &Balance) -> RepoResult<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO balances (id, user_id, name, avatar, amount, currency, last_activity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(balance.id)
        .bind(balance.user_id.as_str())
        .bind(&balance.name)
        .bind(&balance.avatar)
        .bind(balance.amount)
        .bind(balance.currency.as_str())
        .bind(balance.last_activity)
        .bind(balance.created_at)
        .bind(balance.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BalanceRepository for PgBalanceRepository {
    async fn insert(&self, balance: &Balance) -> RepoResult<()> {
        Self::insert_with(&self.pool, balance).await
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Balance>> {
        let row = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT {} FROM balances WHERE id = $1",
            BALANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Balance::try_from).transpose()
    }

    async fn find(&self, filter: &BalanceFilter, page: Option<Page>) -> RepoResult<Vec<Balance>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM balances WHERE TRUE", BALANCE_COLUMNS));

        if let Some(user_id) = &filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id.as_str().to_string());
        }

        query.push(" ORDER BY last_activity DESC, id DESC");

        if let Some(page) = page {
            query
                .push(" OFFSET ")
                .push_bind(page.skip())
                .push(" LIMIT ")
                .push_bind(page.limit());
        }

        let rows = query
            .build_query_as::<BalanceRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Balance::try_from).collect()
    }

    async fn update(
        &self,
        id: Uuid,
        update: &BalanceUpdate,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Balance>> {
        let row = sqlx::query_as::<_, BalanceRow>(&format!(
            r#"
            UPDATE balances
            SET name = COALESCE($2, name),
                avatar = COALESCE($3, avatar),
                amount = COALESCE($4, amount),
                currency = COALESCE($5, currency),
                last_activity = $6,
                updated_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            BALANCE_COLUMNS
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.avatar.as_deref())
        .bind(update.amount)
        .bind(update.currency.map(|c| c.as_str()))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Balance::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM balances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn increment_or_insert(
        &self,
        user_id: &UserId,
        currency: Currency,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> RepoResult<AdjustOutcome> {
        let mut tx = self.pool.begin().await?;

        // Serialize writers for this (user, currency) pair, including the
        // case where no row exists yet and FOR UPDATE has nothing to lock
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("balance:{}:{}", user_id, currency))
            .execute(&mut *tx)
            .await?;

        let current = sqlx::query_as::<_, BalanceRow>(&format!(
            r#"
            SELECT {}
            FROM balances
            WHERE user_id = $1 AND currency = $2
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#,
            BALANCE_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(currency.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match current {
            Some(row) => {
                let mut balance = Balance::try_from(row)?;
                if !balance.credit(delta, now) {
                    return Err(RepositoryError::ConstraintViolation(format!(
                        "adjusting balance {} by {} leaves the amount bounds",
                        balance.id, delta
                    )));
                }

                let updated = sqlx::query_as::<_, BalanceRow>(&format!(
                    r#"
                    UPDATE balances
                    SET amount = amount + $2, last_activity = $3, updated_at = $3
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    BALANCE_COLUMNS
                ))
                .bind(balance.id)
                .bind(delta)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

                AdjustOutcome::Applied(Balance::try_from(updated)?)
            }
            None if delta > Decimal::ZERO => {
                let balance = Balance::opened_by_adjustment(user_id.clone(), delta, currency, now);
                Self::insert_with(&mut *tx, &balance).await?;
                AdjustOutcome::Opened(balance)
            }
            None => AdjustOutcome::Rejected,
        };

        tx.commit().await?;

        Ok(outcome)
    }
}
