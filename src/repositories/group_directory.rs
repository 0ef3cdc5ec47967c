//! Read-only view of group records owned by the group component

use super::{parse_column, RepoResult};
use crate::error::RepositoryError;
use crate::models::{GroupId, GroupMember, GroupRef, UserId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Groups listing `user_id` among their members
    async fn groups_for_user(&self, user_id: &UserId) -> RepoResult<Vec<GroupRef>>;

    async fn group_name(&self, group_id: &GroupId) -> RepoResult<Option<String>>;

    async fn members(&self, group_id: &GroupId) -> RepoResult<Vec<GroupMember>>;
}

#[derive(Debug, FromRow)]
struct GroupRefRow {
    id: String,
    name: String,
}

#[derive(Debug, FromRow)]
struct GroupMemberRow {
    user_id: String,
    name: String,
    avatar: String,
    balance: Decimal,
    currency: String,
}

impl TryFrom<GroupMemberRow> for GroupMember {
    type Error = RepositoryError;

    fn try_from(row: GroupMemberRow) -> Result<Self, Self::Error> {
        Ok(GroupMember {
            user_id: UserId::from(row.user_id),
            name: row.name,
            avatar: row.avatar,
            balance: row.balance,
            currency: parse_column(&row.currency, "group_members.currency")?,
        })
    }
}

pub struct PgGroupDirectory {
    pool: PgPool,
}

impl PgGroupDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupDirectory for PgGroupDirectory {
    async fn groups_for_user(&self, user_id: &UserId) -> RepoResult<Vec<GroupRef>> {
        let rows = sqlx::query_as::<_, GroupRefRow>(
            r#"
            SELECT g.id, g.name
            FROM groups g
            JOIN group_members gm ON gm.group_id = g.id
            WHERE gm.user_id = $1
            ORDER BY gm.joined_at ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| GroupRef {
                id: GroupId::from(row.id),
                name: row.name,
            })
            .collect())
    }

    async fn group_name(&self, group_id: &GroupId) -> RepoResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM groups WHERE id = $1")
            .bind(group_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(name)
    }

    async fn members(&self, group_id: &GroupId) -> RepoResult<Vec<GroupMember>> {
        let rows = sqlx::query_as::<_, GroupMemberRow>(
            r#"
            SELECT user_id, name, avatar, balance, currency
            FROM group_members
            WHERE group_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GroupMember::try_from).collect()
    }
}
