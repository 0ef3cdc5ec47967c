//! Activity feed entries, projected from transactions

use super::{Currency, GroupId, Transaction, TransactionStatus, TransactionType, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A feed entry mirroring one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    /// Same identifier as the source transaction
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: TransactionType,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub group_id: Option<GroupId>,
    pub group_name: Option<String>,
    pub participants: Vec<UserId>,
    pub created_by: UserId,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

impl ActivityItem {
    pub fn from_transaction(tx: &Transaction, group_name: Option<String>) -> Self {
        let description = match &tx.description {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => format!("{} of {} {}", tx.transaction_type, tx.amount, tx.currency),
        };

        Self {
            id: tx.id,
            activity_type: tx.transaction_type,
            title: tx.title.clone(),
            description,
            amount: tx.amount,
            currency: tx.currency,
            group_id: tx.group_id.clone(),
            group_name,
            participants: tx.participants.clone(),
            created_by: tx.user_id.clone(),
            status: tx.status,
            timestamp: tx.created_at,
        }
    }
}

/// Optional, AND-combined filters for activity listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityFilter {
    pub user_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub activity_type: Option<TransactionType>,
    pub since: Option<DateTime<Utc>>,
}

/// Aggregate over a user's activities inside a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub user_id: UserId,
    pub since: DateTime<Utc>,
    pub total_activities: u64,
    pub count_by_type: BTreeMap<TransactionType, u64>,
    pub count_by_status: BTreeMap<TransactionStatus, u64>,
    /// Sum of activity amounts converted to INR
    pub total_amount: Decimal,
    pub currency: Currency,
}
