//! Activity feed computed on read from transaction records.
//!
//! Nothing is stored here: every call re-reads transactions, so an activity
//! always shows the current status and amount of its transaction.

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{
    accumulate, convert_to_inr, ActivityFilter, ActivityItem, ActivityStats, Audience, Currency,
    GroupId, Page, Transaction, TransactionFilter, TransactionStatus, TransactionType, UserId,
};
use crate::repositories::{GroupDirectory, TransactionRepository};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Window used by `recent_for_user`
pub const RECENT_WINDOW_DAYS: i64 = 7;

pub struct ActivityProjector {
    transactions: Arc<dyn TransactionRepository>,
    groups: Arc<dyn GroupDirectory>,
    clock: Arc<dyn Clock>,
}

impl ActivityProjector {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        groups: Arc<dyn GroupDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transactions,
            groups,
            clock,
        }
    }

    /// Activities matching every provided filter, newest first
    pub async fn list(&self, filter: &ActivityFilter, page: Page) -> AppResult<Vec<ActivityItem>> {
        let tx_filter = TransactionFilter {
            user_id: filter.user_id.clone(),
            group_id: filter.group_id.clone(),
            transaction_type: filter.activity_type,
            created_from: filter.since,
            ..Default::default()
        };
        self.project_query(&tx_filter, Some(page)).await
    }

    /// Activities the user created or participates in
    pub async fn by_user(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
        page: Page,
    ) -> AppResult<Vec<ActivityItem>> {
        self.project_query(&involving(user_id, Vec::new(), since), Some(page))
            .await
    }

    pub async fn by_group(
        &self,
        group_id: &GroupId,
        since: Option<DateTime<Utc>>,
        page: Page,
    ) -> AppResult<Vec<ActivityItem>> {
        let filter = TransactionFilter {
            group_id: Some(group_id.clone()),
            created_from: since,
            ..Default::default()
        };
        self.project_query(&filter, Some(page)).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ActivityItem> {
        let tx = self
            .transactions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))?;

        let mut items = self.project(vec![tx]).await?;
        items
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    /// The user's activities from the last seven days
    pub async fn recent_for_user(&self, user_id: &UserId, limit: i64) -> AppResult<Vec<ActivityItem>> {
        let since = self.clock.now() - Duration::days(RECENT_WINDOW_DAYS);
        self.by_user(user_id, Some(since), Page::first(limit)?).await
    }

    /// The user's own activities plus everything recorded in their groups
    pub async fn feed(&self, user_id: &UserId, page: Page) -> AppResult<Vec<ActivityItem>> {
        let group_ids: Vec<GroupId> = self
            .groups
            .groups_for_user(user_id)
            .await?
            .into_iter()
            .map(|g| g.id)
            .collect();

        debug!("Building feed for {} across {} groups", user_id, group_ids.len());

        // One audience query; each transaction appears once
        self.project_query(&involving(user_id, group_ids, None), Some(page))
            .await
    }

    /// Aggregate over the user's activities since `since`
    pub async fn stats_for_user(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> AppResult<ActivityStats> {
        let transactions = self
            .transactions
            .find(&involving(user_id, Vec::new(), Some(since)), None)
            .await?;

        let mut count_by_type: BTreeMap<TransactionType, u64> = BTreeMap::new();
        let mut count_by_status: BTreeMap<TransactionStatus, u64> = BTreeMap::new();
        let mut total_amount = Decimal::ZERO;

        for tx in &transactions {
            *count_by_type.entry(tx.transaction_type).or_default() += 1;
            *count_by_status.entry(tx.status).or_default() += 1;
            accumulate(&mut total_amount, convert_to_inr(tx.amount, tx.currency)?)?;
        }

        Ok(ActivityStats {
            user_id: user_id.clone(),
            since,
            total_activities: transactions.len() as u64,
            count_by_type,
            count_by_status,
            total_amount,
            currency: Currency::Inr,
        })
    }

    async fn project_query(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> AppResult<Vec<ActivityItem>> {
        let transactions = self.transactions.find(filter, page).await?;
        self.project(transactions).await
    }

    /// Map transactions to activities, looking each group name up once
    async fn project(&self, transactions: Vec<Transaction>) -> AppResult<Vec<ActivityItem>> {
        let mut names: HashMap<GroupId, Option<String>> = HashMap::new();
        let mut items = Vec::with_capacity(transactions.len());

        for tx in &transactions {
            let group_name = match &tx.group_id {
                Some(group_id) => {
                    if !names.contains_key(group_id) {
                        let name = self.groups.group_name(group_id).await?;
                        names.insert(group_id.clone(), name);
                    }
                    names.get(group_id).cloned().flatten()
                }
                None => None,
            };
            items.push(ActivityItem::from_transaction(tx, group_name));
        }

        Ok(items)
    }
}

fn involving(
    user_id: &UserId,
    group_ids: Vec<GroupId>,
    since: Option<DateTime<Utc>>,
) -> TransactionFilter {
    TransactionFilter {
        audience: Some(Audience {
            user_id: user_id.clone(),
            group_ids,
        }),
        created_from: since,
        ..Default::default()
    }
}
