//! Balance records: a user's running total in one currency

use super::{Currency, UserId, MAX_AMOUNT};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name given to balances opened implicitly by `adjust`
pub const AUTO_BALANCE_NAME: &str = "Auto-generated";

/// A user's balance in a single currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub id: Uuid,
    pub user_id: UserId,
    pub name: String,
    pub avatar: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Build a fresh record; every timestamp starts at `now`
    pub fn new(input: NewBalance, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            name: input.name,
            avatar: input.avatar,
            amount: input.amount,
            currency: input.currency,
            last_activity: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seed record for a positive adjustment against a missing balance
    pub fn opened_by_adjustment(
        user_id: UserId,
        amount: Decimal,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            NewBalance {
                user_id,
                name: AUTO_BALANCE_NAME.to_string(),
                avatar: String::new(),
                amount,
                currency,
            },
            now,
        )
    }

    /// Merge the provided fields and refresh the activity timestamps
    pub fn apply(&mut self, update: &BalanceUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(avatar) = &update.avatar {
            self.avatar = avatar.clone();
        }
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        self.touch(now);
    }

    /// Add `delta` to the running total. Returns `false` and leaves the
    /// balance untouched when the sum would leave the amount bounds.
    pub fn credit(&mut self, delta: Decimal, now: DateTime<Utc>) -> bool {
        match self.amount.checked_add(delta) {
            Some(amount) if amount.abs() <= MAX_AMOUNT => {
                self.amount = amount;
                self.touch(now);
                true
            }
            _ => false,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.last_activity = now;
    }
}

/// Input for creating a balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBalance {
    pub user_id: UserId,
    pub name: String,
    pub avatar: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
}

/// Result of an incremental adjustment
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustOutcome {
    /// An existing balance absorbed the delta
    Applied(Balance),
    /// No balance existed and a positive delta opened one
    Opened(Balance),
    /// No balance existed and the delta was not positive; nothing was written
    Rejected,
}

impl AdjustOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, AdjustOutcome::Rejected)
    }

    pub fn balance(&self) -> Option<&Balance> {
        match self {
            AdjustOutcome::Applied(b) | AdjustOutcome::Opened(b) => Some(b),
            AdjustOutcome::Rejected => None,
        }
    }
}

/// Filter for balance listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceFilter {
    pub user_id: Option<UserId>,
}

/// Cross-currency total for a user, expressed in INR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceTotal {
    pub user_id: UserId,
    pub total_balance: Decimal,
    pub currency: Currency,
}
