//! Repository for transaction records

use super::{parse_column, RepoResult};
use crate::error::RepositoryError;
use crate::models::{GroupId, Page, Transaction, TransactionFilter, TransactionStatus, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Transaction>>;

    /// Matching transactions, newest first (ties broken by id desc)
    async fn find(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> RepoResult<Vec<Transaction>>;

    /// Persist every field of `tx` except status, but only while the stored
    /// status still equals `tx.status`. Returns false when the id is unknown
    /// or the status moved underneath the caller.
    async fn update_details(&self, tx: &Transaction) -> RepoResult<bool>;

    /// Compare-and-set on status. `None` when the id is unknown or the stored
    /// status is not `expected`.
    async fn update_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        next: TransactionStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Transaction>>;

    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

const TRANSACTION_COLUMNS: &str = "id, user_id, title, amount, currency, transaction_type, status, \
     group_id, participants, description, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: String,
    title: String,
    amount: Decimal,
    currency: String,
    transaction_type: String,
    status: String,
    group_id: Option<String>,
    participants: Vec<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            user_id: UserId::from(row.user_id),
            title: row.title,
            amount: row.amount,
            currency: parse_column(&row.currency, "transactions.currency")?,
            transaction_type: parse_column(&row.transaction_type, "transactions.transaction_type")?,
            status: parse_column(&row.status, "transactions.status")?,
            group_id: row.group_id.map(GroupId::from),
            participants: row.participants.into_iter().map(UserId::from).collect(),
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn participant_strings(tx: &Transaction) -> Vec<String> {
    tx.participants.iter().map(|p| p.as_str().to_string()).collect()
}

pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
        if let Some(user_id) = &filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id.as_str().to_string());
        }
        if let Some(group_id) = &filter.group_id {
            query.push(" AND group_id = ").push_bind(group_id.as_str().to_string());
        }
        if let Some(transaction_type) = filter.transaction_type {
            query
                .push(" AND transaction_type = ")
                .push_bind(transaction_type.as_str());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(audience) = &filter.audience {
            let user = audience.user_id.as_str().to_string();
            let groups: Vec<String> = audience
                .group_ids
                .iter()
                .map(|g| g.as_str().to_string())
                .collect();

            query
                .push(" AND (user_id = ")
                .push_bind(user.clone())
                .push(" OR ")
                .push_bind(user)
                .push(" = ANY(participants) OR group_id = ANY(")
                .push_bind(groups)
                .push("))");
        }
        if let Some(from) = filter.created_from {
            query.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(before) = filter.created_before {
            query.push(" AND created_at < ").push_bind(before);
        }
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, title, amount, currency, transaction_type, status,
                group_id, participants, description, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(tx.id)
        .bind(tx.user_id.as_str())
        .bind(&tx.title)
        .bind(tx.amount)
        .bind(tx.currency.as_str())
        .bind(tx.transaction_type.as_str())
        .bind(tx.status.as_str())
        .bind(tx.group_id.as_ref().map(|g| g.as_str()))
        .bind(participant_strings(tx))
        .bind(tx.description.as_deref())
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn find(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> RepoResult<Vec<Transaction>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM transactions WHERE TRUE",
            TRANSACTION_COLUMNS
        ));

        Self::push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id DESC");

        if let Some(page) = page {
            query
                .push(" OFFSET ")
                .push_bind(page.skip())
                .push(" LIMIT ")
                .push_bind(page.limit());
        }

        let rows = query
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn update_details(&self, tx: &Transaction) -> RepoResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE transactions
            SET title = $2,
                amount = $3,
                currency = $4,
                transaction_type = $5,
                participants = $6,
                description = $7,
                updated_at = $8
            WHERE id = $1 AND status = $9
            "#,
        )
        .bind(tx.id)
        .bind(&tx.title)
        .bind(tx.amount)
        .bind(tx.currency.as_str())
        .bind(tx.transaction_type.as_str())
        .bind(participant_strings(tx))
        .bind(tx.description.as_deref())
        .bind(tx.updated_at)
        .bind(tx.status.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        next: TransactionStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
