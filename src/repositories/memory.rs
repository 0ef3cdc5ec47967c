//! In-process implementation of every repository trait.
//!
//! Balances are sharded by (user, currency): each shard sits behind its own
//! `tokio::sync::Mutex`, so adjustments for one pair never wait on another.
//! An id index maps every balance to its shard. Lock order is shard before
//! index; the index and the shard map are never held while a shard is
//! awaited. Every other collection sits behind one `tokio::sync::RwLock` and
//! does its read-modify-write inside a single write guard.

use super::{
    BalanceRepository, FaqRepository, GroupDirectory, RepoResult, SpendingReportRepository,
    TransactionRepository,
};
use crate::error::RepositoryError;
use crate::models::{
    AdjustOutcome, Balance, BalanceFilter, BalanceUpdate, Currency, FaqItem, FaqUpdate, Group,
    GroupId, GroupMember, GroupRef, Page, SpendingReport, Transaction, TransactionFilter,
    TransactionStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type ReportKey = (UserId, i32, u32);
type BalanceKey = (UserId, Currency);
type BalanceShard = Arc<Mutex<HashMap<Uuid, Balance>>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    balance_shards: RwLock<HashMap<BalanceKey, BalanceShard>>,
    balance_index: RwLock<HashMap<Uuid, BalanceKey>>,
    transactions: RwLock<HashMap<Uuid, Transaction>>,
    reports: RwLock<HashMap<ReportKey, SpendingReport>>,
    faqs: RwLock<HashMap<Uuid, FaqItem>>,
    groups: RwLock<BTreeMap<GroupId, Group>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a group record
    pub async fn upsert_group(&self, group: Group) {
        self.groups.write().await.insert(group.id.clone(), group);
    }

    pub async fn remove_group(&self, group_id: &GroupId) -> bool {
        self.groups.write().await.remove(group_id).is_some()
    }

    /// Shard holding the balances of one (user, currency) pair, created on demand
    async fn balance_shard(&self, key: &BalanceKey) -> BalanceShard {
        if let Some(shard) = self.balance_shards.read().await.get(key) {
            return shard.clone();
        }
        self.balance_shards
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    async fn balance_key(&self, id: Uuid) -> Option<BalanceKey> {
        self.balance_index.read().await.get(&id).cloned()
    }
}

fn paginate<T>(items: Vec<T>, page: Option<Page>) -> Vec<T> {
    match page {
        Some(page) => page.apply(items),
        None => items,
    }
}

// =========================================================================
// Balances
// =========================================================================

// Lookups by id read the index, release it, then lock the shard. A balance
// that moved or vanished in between sends the lookup round again; the loop
// ends once the index no longer knows the id.

#[async_trait]
impl BalanceRepository for MemoryStore {
    async fn insert(&self, balance: &Balance) -> RepoResult<()> {
        let key = (balance.user_id.clone(), balance.currency);
        let shard = self.balance_shard(&key).await;
        let mut rows = shard.lock().await;

        let mut index = self.balance_index.write().await;
        if index.contains_key(&balance.id) {
            return Err(RepositoryError::Duplicate(format!("balance {}", balance.id)));
        }
        index.insert(balance.id, key);
        rows.insert(balance.id, balance.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Balance>> {
        while let Some(key) = self.balance_key(id).await {
            let shard = self.balance_shard(&key).await;
            if let Some(balance) = shard.lock().await.get(&id) {
                return Ok(Some(balance.clone()));
            };
        }
        Ok(None)
    }

    async fn find(&self, filter: &BalanceFilter, page: Option<Page>) -> RepoResult<Vec<Balance>> {
        let shards: Vec<BalanceShard> = self
            .balance_shards
            .read()
            .await
            .iter()
            .filter(|((user_id, _), _)| filter.user_id.as_ref().map_or(true, |u| user_id == u))
            .map(|(_, shard)| shard.clone())
            .collect();

        let mut matched = Vec::new();
        for shard in shards {
            matched.extend(shard.lock().await.values().cloned());
        }

        matched.sort_by_key(|b: &Balance| Reverse((b.last_activity, b.id)));
        Ok(paginate(matched, page))
    }

    async fn update(
        &self,
        id: Uuid,
        update: &BalanceUpdate,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Balance>> {
        while let Some(key) = self.balance_key(id).await {
            let target = match update.currency {
                Some(currency) if currency != key.1 => (key.0.clone(), currency),
                _ => key.clone(),
            };

            if target == key {
                let shard = self.balance_shard(&key).await;
                if let Some(balance) = shard.lock().await.get_mut(&id) {
                    balance.apply(update, now);
                    return Ok(Some(balance.clone()));
                }
                continue;
            }

            // Currency change: the row moves shards. Both are locked in key
            // order so two opposite moves cannot deadlock.
            let from_shard = self.balance_shard(&key).await;
            let to_shard = self.balance_shard(&target).await;
            let (mut from, mut to) = if key < target {
                let from = from_shard.lock().await;
                (from, to_shard.lock().await)
            } else {
                let to = to_shard.lock().await;
                (from_shard.lock().await, to)
            };

            if let Some(mut balance) = from.remove(&id) {
                balance.apply(update, now);
                to.insert(id, balance.clone());
                self.balance_index.write().await.insert(id, target);
                return Ok(Some(balance));
            }
        }
        Ok(None)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        while let Some(key) = self.balance_key(id).await {
            let shard = self.balance_shard(&key).await;
            let mut rows = shard.lock().await;
            if rows.remove(&id).is_some() {
                self.balance_index.write().await.remove(&id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn increment_or_insert(
        &self,
        user_id: &UserId,
        currency: Currency,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> RepoResult<AdjustOutcome> {
        let key = (user_id.clone(), currency);
        let shard = self.balance_shard(&key).await;
        let mut rows = shard.lock().await;

        let canonical = rows
            .values()
            .min_by_key(|b| (b.created_at, b.id))
            .map(|b| b.id);

        let outcome = match canonical.and_then(|id| rows.get_mut(&id)) {
            Some(balance) => {
                if !balance.credit(delta, now) {
                    return Err(RepositoryError::ConstraintViolation(format!(
                        "adjusting balance {} by {} leaves the amount bounds",
                        balance.id, delta
                    )));
                }
                AdjustOutcome::Applied(balance.clone())
            }
            None if delta > Decimal::ZERO => {
                let balance = Balance::opened_by_adjustment(user_id.clone(), delta, currency, now);
                self.balance_index.write().await.insert(balance.id, key);
                rows.insert(balance.id, balance.clone());
                AdjustOutcome::Opened(balance)
            }
            None => AdjustOutcome::Rejected,
        };

        Ok(outcome)
    }
}

// =========================================================================
// Transactions
// =========================================================================

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn insert(&self, tx: &Transaction) -> RepoResult<()> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&tx.id) {
            return Err(RepositoryError::Duplicate(format!("transaction {}", tx.id)));
        }
        transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Transaction>> {
        Ok(self.transactions.read().await.get(&id).cloned())
    }

    async fn find(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> RepoResult<Vec<Transaction>> {
        let mut matched: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();

        matched.sort_by_key(|tx| Reverse((tx.created_at, tx.id)));
        Ok(paginate(matched, page))
    }

    async fn update_details(&self, tx: &Transaction) -> RepoResult<bool> {
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(&tx.id) {
            Some(stored) if stored.status == tx.status => {
                *stored = tx.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        next: TransactionStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Transaction>> {
        let mut transactions = self.transactions.write().await;
        Ok(match transactions.get_mut(&id) {
            Some(stored) if stored.status == expected => {
                stored.status = next;
                stored.updated_at = now;
                Some(stored.clone())
            }
            _ => None,
        })
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.transactions.write().await.remove(&id).is_some())
    }
}

// =========================================================================
// Spending reports
// =========================================================================

#[async_trait]
impl SpendingReportRepository for MemoryStore {
    async fn upsert(&self, report: &SpendingReport) -> RepoResult<SpendingReport> {
        let key = (report.user_id.clone(), report.year, report.month);
        let mut reports = self.reports.write().await;

        let mut stored = report.clone();
        if let Some(existing) = reports.get(&key) {
            stored.id = existing.id;
        }
        reports.insert(key, stored.clone());

        Ok(stored)
    }

    async fn find(
        &self,
        user_id: &UserId,
        year: i32,
        month: u32,
    ) -> RepoResult<Option<SpendingReport>> {
        let key = (user_id.clone(), year, month);
        Ok(self.reports.read().await.get(&key).cloned())
    }

    async fn list(
        &self,
        user_id: &UserId,
        year: Option<i32>,
        limit: i64,
    ) -> RepoResult<Vec<SpendingReport>> {
        let mut matched: Vec<SpendingReport> = self
            .reports
            .read()
            .await
            .values()
            .filter(|r| &r.user_id == user_id && year.map_or(true, |y| r.year == y))
            .cloned()
            .collect();

        matched.sort_by_key(|r| Reverse(r.period()));
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }
}

// =========================================================================
// FAQ
// =========================================================================

#[async_trait]
impl FaqRepository for MemoryStore {
    async fn insert(&self, item: &FaqItem) -> RepoResult<()> {
        let mut faqs = self.faqs.write().await;
        if faqs.contains_key(&item.id) {
            return Err(RepositoryError::Duplicate(format!("faq {}", item.id)));
        }
        faqs.insert(item.id, item.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<FaqItem>> {
        Ok(self.faqs.read().await.get(&id).cloned())
    }

    async fn list(&self, category: Option<&str>, active_only: bool) -> RepoResult<Vec<FaqItem>> {
        let mut matched: Vec<FaqItem> = self
            .faqs
            .read()
            .await
            .values()
            .filter(|f| !active_only || f.is_active)
            .filter(|f| category.map_or(true, |c| f.category == c))
            .cloned()
            .collect();

        matched.sort_by_key(|f| (f.order, f.created_at, f.id));
        Ok(matched)
    }

    async fn update(&self, id: Uuid, update: &FaqUpdate) -> RepoResult<Option<FaqItem>> {
        let mut faqs = self.faqs.write().await;
        Ok(faqs.get_mut(&id).map(|item| {
            item.apply(update);
            item.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.faqs.write().await.remove(&id).is_some())
    }
}

// =========================================================================
// Groups
// =========================================================================

#[async_trait]
impl GroupDirectory for MemoryStore {
    async fn groups_for_user(&self, user_id: &UserId) -> RepoResult<Vec<GroupRef>> {
        Ok(self
            .groups
            .read()
            .await
            .values()
            .filter(|g| g.is_member(user_id))
            .map(|g| GroupRef {
                id: g.id.clone(),
                name: g.name.clone(),
            })
            .collect())
    }

    async fn group_name(&self, group_id: &GroupId) -> RepoResult<Option<String>> {
        Ok(self.groups.read().await.get(group_id).map(|g| g.name.clone()))
    }

    async fn members(&self, group_id: &GroupId) -> RepoResult<Vec<GroupMember>> {
        Ok(self
            .groups
            .read()
            .await
            .get(group_id)
            .map(|g| g.members.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_increment_targets_oldest_balance() {
        let store = MemoryStore::new();
        let user = UserId::from("alice");

        let mut older = Balance::opened_by_adjustment(user.clone(), Decimal::new(10, 0), Currency::Inr, at(1));
        older.name = "older".to_string();
        let newer = Balance::opened_by_adjustment(user.clone(), Decimal::new(50, 0), Currency::Inr, at(2));
        BalanceRepository::insert(&store, &newer).await.unwrap();
        BalanceRepository::insert(&store, &older).await.unwrap();

        let outcome = store
            .increment_or_insert(&user, Currency::Inr, Decimal::new(5, 0), at(3))
            .await
            .unwrap();

        let updated = outcome.balance().unwrap();
        assert_eq!(updated.id, older.id);
        assert_eq!(updated.amount, Decimal::new(15, 0));
        assert_eq!(updated.last_activity, at(3));
    }

    #[tokio::test]
    async fn test_increment_without_balance() {
        let store = MemoryStore::new();
        let user = UserId::from("bob");

        let rejected = store
            .increment_or_insert(&user, Currency::Usd, Decimal::new(-5, 0), at(1))
            .await
            .unwrap();
        assert_eq!(rejected, AdjustOutcome::Rejected);
        assert!(BalanceRepository::find(&store, &BalanceFilter::default(), None)
            .await
            .unwrap()
            .is_empty());

        let opened = store
            .increment_or_insert(&user, Currency::Usd, Decimal::new(5, 0), at(1))
            .await
            .unwrap();
        assert!(matches!(opened, AdjustOutcome::Opened(_)));
    }

    #[tokio::test]
    async fn test_locked_pair_does_not_block_other_pairs() {
        let store = MemoryStore::new();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let shard = store.balance_shard(&(alice.clone(), Currency::Inr)).await;
        let held = shard.lock().await;

        let bob_inr = timeout(
            StdDuration::from_secs(5),
            store.increment_or_insert(&bob, Currency::Inr, Decimal::ONE, at(1)),
        )
        .await;
        assert!(matches!(bob_inr, Ok(Ok(AdjustOutcome::Opened(_)))));

        let alice_usd = timeout(
            StdDuration::from_secs(5),
            store.increment_or_insert(&alice, Currency::Usd, Decimal::ONE, at(1)),
        )
        .await;
        assert!(matches!(alice_usd, Ok(Ok(AdjustOutcome::Opened(_)))));

        let alice_inr = timeout(
            StdDuration::from_millis(50),
            store.increment_or_insert(&alice, Currency::Inr, Decimal::ONE, at(1)),
        )
        .await;
        assert!(alice_inr.is_err());

        drop(held);
        let opened = store
            .increment_or_insert(&alice, Currency::Inr, Decimal::ONE, at(2))
            .await
            .unwrap();
        assert!(matches!(opened, AdjustOutcome::Opened(_)));
    }

    #[tokio::test]
    async fn test_currency_update_moves_balance() {
        let store = MemoryStore::new();
        let user = UserId::from("dave");
        let balance = Balance::opened_by_adjustment(user.clone(), Decimal::new(20, 0), Currency::Inr, at(1));
        BalanceRepository::insert(&store, &balance).await.unwrap();

        let update = BalanceUpdate {
            currency: Some(Currency::Eur),
            ..Default::default()
        };
        let moved = BalanceRepository::update(&store, balance.id, &update, at(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.currency, Currency::Eur);
        assert_eq!(BalanceRepository::find_by_id(&store, balance.id).await.unwrap(), Some(moved));

        let eur = store
            .increment_or_insert(&user, Currency::Eur, Decimal::new(5, 0), at(3))
            .await
            .unwrap();
        assert_eq!(eur.balance().unwrap().id, balance.id);
        assert_eq!(eur.balance().unwrap().amount, Decimal::new(25, 0));

        let inr = store
            .increment_or_insert(&user, Currency::Inr, Decimal::new(-5, 0), at(3))
            .await
            .unwrap();
        assert_eq!(inr, AdjustOutcome::Rejected);

        assert!(BalanceRepository::delete(&store, balance.id).await.unwrap());
        assert!(!BalanceRepository::delete(&store, balance.id).await.unwrap());
        assert_eq!(BalanceRepository::find_by_id(&store, balance.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_balance_id_is_rejected() {
        let store = MemoryStore::new();
        let balance = Balance::opened_by_adjustment("erin".into(), Decimal::ONE, Currency::Inr, at(1));
        BalanceRepository::insert(&store, &balance).await.unwrap();

        let mut same_id = balance.clone();
        same_id.currency = Currency::Usd;
        let err = BalanceRepository::insert(&store, &same_id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_increment_past_bounds_leaves_balance() {
        let store = MemoryStore::new();
        let user = UserId::from("frank");
        let full = Balance::opened_by_adjustment(user.clone(), crate::models::MAX_AMOUNT, Currency::Inr, at(1));
        BalanceRepository::insert(&store, &full).await.unwrap();

        let err = store
            .increment_or_insert(&user, Currency::Inr, Decimal::ONE, at(2))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ConstraintViolation(_)));

        let stored = BalanceRepository::find_by_id(&store, full.id).await.unwrap().unwrap();
        assert_eq!(stored, full);
    }

    #[tokio::test]
    async fn test_report_upsert_keeps_id() {
        let store = MemoryStore::new();
        let first = SpendingReport {
            id: Uuid::new_v4(),
            user_id: "carol".into(),
            year: 2024,
            month: 4,
            total_spent: Decimal::new(100, 0),
            currency: Currency::Inr,
            categories: vec![],
            trends: serde_json::json!({}),
            created_at: at(1),
        };
        let stored = store.upsert(&first).await.unwrap();
        assert_eq!(stored.id, first.id);

        let second = SpendingReport {
            id: Uuid::new_v4(),
            total_spent: Decimal::new(200, 0),
            created_at: at(1) + Duration::days(1),
            ..first.clone()
        };
        let replaced = store.upsert(&second).await.unwrap();
        assert_eq!(replaced.id, first.id);
        assert_eq!(replaced.total_spent, Decimal::new(200, 0));
    }
}
