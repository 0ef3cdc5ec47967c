//! Transaction records and the rules governing their lifecycle

use super::{Currency, GroupId, UserId};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of money movement a transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Split,
    Payment,
    Loan,
    Refund,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [
        TransactionType::Split,
        TransactionType::Payment,
        TransactionType::Loan,
        TransactionType::Refund,
    ];

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Split => "split",
            TransactionType::Payment => "payment",
            TransactionType::Loan => "loan",
            TransactionType::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "split" => Ok(TransactionType::Split),
            "payment" => Ok(TransactionType::Payment),
            "loan" => Ok(TransactionType::Loan),
            "refund" => Ok(TransactionType::Refund),
            _ => Err(AppError::Validation(format!("Invalid transaction type: {}", s))),
        }
    }
}

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Settled,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 3] = [
        TransactionStatus::Pending,
        TransactionStatus::Settled,
        TransactionStatus::Cancelled,
    ];

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Settled => "settled",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Settled and cancelled transactions never move again
    pub fn is_terminal(&self) -> bool {
        match self {
            TransactionStatus::Pending => false,
            TransactionStatus::Settled | TransactionStatus::Cancelled => true,
        }
    }

    /// Only pending -> settled and pending -> cancelled are legal
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Settled)
                | (TransactionStatus::Pending, TransactionStatus::Cancelled)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "settled" => Ok(TransactionStatus::Settled),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            _ => Err(AppError::Validation(format!("Invalid transaction status: {}", s))),
        }
    }
}

/// A shared expense, payment, loan or refund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub title: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub group_id: Option<GroupId>,
    pub participants: Vec<UserId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a pending transaction stamped with `now`
    pub fn new(input: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            title: input.title,
            amount: input.amount,
            currency: input.currency,
            transaction_type: input.transaction_type,
            status: TransactionStatus::Pending,
            group_id: input.group_id,
            participants: dedup_participants(input.participants),
            description: input.description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user` created the transaction or is listed as a participant
    pub fn involves(&self, user: &UserId) -> bool {
        &self.user_id == user || self.participants.contains(user)
    }

    /// Participants other than the creator
    pub fn counterparties(&self) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| **p != self.user_id)
            .cloned()
            .collect()
    }

    pub fn apply(&mut self, update: &TransactionUpdate, now: DateTime<Utc>) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        if let Some(transaction_type) = update.transaction_type {
            self.transaction_type = transaction_type;
        }
        if let Some(participants) = &update.participants {
            self.participants = dedup_participants(participants.clone());
        }
        self.updated_at = now;
    }
}

/// Drop repeated participants, keeping first occurrence order
fn dedup_participants(participants: Vec<UserId>) -> Vec<UserId> {
    let mut seen = Vec::with_capacity(participants.len());
    for participant in participants {
        if !seen.contains(&participant) {
            seen.push(participant);
        }
    }
    seen
}

/// Input for creating a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub title: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub participants: Vec<UserId>,
    pub description: Option<String>,
}

/// Partial update. Status is deliberately absent: it only changes through
/// `TransactionService::set_status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub participants: Option<Vec<UserId>>,
}

impl TransactionUpdate {
    /// Fields that are frozen once a transaction leaves `pending`
    pub fn touches_financials(&self) -> bool {
        self.amount.is_some()
            || self.currency.is_some()
            || self.transaction_type.is_some()
            || self.participants.is_some()
    }
}

/// Users whose activity a query should cover: anything they created or
/// participate in, plus anything recorded in one of `group_ids`
#[derive(Debug, Clone, PartialEq)]
pub struct Audience {
    pub user_id: UserId,
    pub group_ids: Vec<GroupId>,
}

/// AND-combined optional filters over transactions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub user_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub audience: Option<Audience>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn by_owner(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn by_group(group_id: GroupId) -> Self {
        Self {
            group_id: Some(group_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(user_id) = &self.user_id {
            if &tx.user_id != user_id {
                return false;
            }
        }
        if let Some(group_id) = &self.group_id {
            if tx.group_id.as_ref() != Some(group_id) {
                return false;
            }
        }
        if let Some(transaction_type) = self.transaction_type {
            if tx.transaction_type != transaction_type {
                return false;
            }
        }
        if let Some(status) = self.status {
            if tx.status != status {
                return false;
            }
        }
        if let Some(audience) = &self.audience {
            let in_group = tx
                .group_id
                .as_ref()
                .map(|g| audience.group_ids.contains(g))
                .unwrap_or(false);
            if !tx.involves(&audience.user_id) && !in_group {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if tx.created_at < from {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if tx.created_at >= before {
                return false;
            }
        }
        true
    }
}

/// Per-owner aggregate over every stored transaction, amounts in INR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub user_id: UserId,
    pub total_count: u64,
    pub count_by_status: BTreeMap<TransactionStatus, u64>,
    pub total_by_status: BTreeMap<TransactionStatus, Decimal>,
    pub count_by_type: BTreeMap<TransactionType, u64>,
    pub total_by_type: BTreeMap<TransactionType, Decimal>,
    /// Creator-side settlement effect of the owner's settled transactions
    pub net_amount: Decimal,
    pub currency: Currency,
}
