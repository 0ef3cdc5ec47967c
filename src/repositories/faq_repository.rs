use super::RepoResult;
use crate::models::{FaqItem, FaqUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

#[async_trait]
pub trait FaqRepository: Send + Sync {
    async fn insert(&self, item: &FaqItem) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<FaqItem>>;

    /// Items ordered by `order`, then creation time
    async fn list(&self, category: Option<&str>, active_only: bool) -> RepoResult<Vec<FaqItem>>;

    async fn update(&self, id: Uuid, update: &FaqUpdate) -> RepoResult<Option<FaqItem>>;

    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

const FAQ_COLUMNS: &str = "id, question, answer, category, sort_order, is_active, created_at";

#[derive(Debug, FromRow)]
struct FaqRow {
    id: Uuid,
    question: String,
    answer: String,
    category: String,
    sort_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<FaqRow> for FaqItem {
    fn from(row: FaqRow) -> Self {
        FaqItem {
            id: row.id,
            question: row.question,
            answer: row.answer,
            category: row.category,
            order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

pub struct PgFaqRepository {
    pool: PgPool,
}

impl PgFaqRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FaqRepository for PgFaqRepository {
    async fn insert(&self, item: &FaqItem) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO faq_items (id, question, answer, category, sort_order, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(&item.question)
        .bind(&item.answer)
        .bind(&item.category)
        .bind(item.order)
        .bind(item.is_active)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<FaqItem>> {
        let row = sqlx::query_as::<_, FaqRow>(&format!(
            "SELECT {} FROM faq_items WHERE id = $1",
            FAQ_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FaqItem::from))
    }

    async fn list(&self, category: Option<&str>, active_only: bool) -> RepoResult<Vec<FaqItem>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM faq_items WHERE TRUE", FAQ_COLUMNS));

        if active_only {
            query.push(" AND is_active");
        }
        if let Some(category) = category {
            query.push(" AND category = ").push_bind(category.to_string());
        }
        query.push(" ORDER BY sort_order ASC, created_at ASC");

        let rows = query.build_query_as::<FaqRow>().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(FaqItem::from).collect())
    }

    async fn update(&self, id: Uuid, update: &FaqUpdate) -> RepoResult<Option<FaqItem>> {
        let row = sqlx::query_as::<_, FaqRow>(&format!(
            r#"
            UPDATE faq_items
            SET question = COALESCE($2, question),
                answer = COALESCE($3, answer),
                category = COALESCE($4, category),
                sort_order = COALESCE($5, sort_order),
                is_active = COALESCE($6, is_active)
            WHERE id = $1
            RETURNING {}
            "#,
            FAQ_COLUMNS
        ))
        .bind(id)
        .bind(update.question.as_deref())
        .bind(update.answer.as_deref())
        .bind(update.category.as_deref())
        .bind(update.order)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FaqItem::from))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM faq_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
