//! Settlement: turning a settled transaction into balance adjustments.
//!
//! `SettlementPlan` is pure and derives one delta per affected user.
//! `SettlementService` flips the transaction to `settled` and then pushes each
//! delta through `BalanceLedger::adjust`. The adjustments are independent
//! writes; failures are reported per delta instead of rolled back.

use super::{BalanceLedger, TransactionService};
use crate::error::{AppError, AppResult};
use crate::models::{
    AdjustOutcome, Balance, Currency, Transaction, TransactionStatus, TransactionType, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Signed change to one user's balance in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub user_id: UserId,
    pub currency: Currency,
    pub amount: Decimal,
}

/// Balance changes implied by settling a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub transaction_id: Uuid,
    pub deltas: Vec<BalanceDelta>,
}

impl SettlementPlan {
    /// Derive the deltas for `tx`.
    ///
    /// - split: the amount is divided in equal cent shares between the creator
    ///   and every counterparty; counterparties owe their share, the creator
    ///   is owed the sum of those shares
    /// - payment, loan: the creator is owed the amount, counterparties owe it
    /// - refund: the creator owes the amount back to the counterparties
    ///
    /// A transaction without counterparties produces an empty plan. Fails
    /// when the amount is too large to split into cents.
    pub fn for_transaction(tx: &Transaction) -> AppResult<Self> {
        let counterparties = tx.counterparties();
        let mut deltas = Vec::with_capacity(counterparties.len() + 1);

        if !counterparties.is_empty() {
            let (shares, sign) = match tx.transaction_type {
                TransactionType::Split => {
                    // First share is the creator's own portion
                    let shares = allocate(tx.amount, counterparties.len() + 1)?;
                    (shares[1..].to_vec(), Decimal::NEGATIVE_ONE)
                }
                TransactionType::Payment | TransactionType::Loan => {
                    (allocate(tx.amount, counterparties.len())?, Decimal::NEGATIVE_ONE)
                }
                TransactionType::Refund => (allocate(tx.amount, counterparties.len())?, Decimal::ONE),
            };

            let creator_total: Decimal = shares.iter().copied().sum();
            if !creator_total.is_zero() {
                deltas.push(BalanceDelta {
                    user_id: tx.user_id.clone(),
                    currency: tx.currency,
                    amount: -sign * creator_total,
                });
            }

            for (user_id, share) in counterparties.into_iter().zip(shares) {
                if share.is_zero() {
                    continue;
                }
                deltas.push(BalanceDelta {
                    user_id,
                    currency: tx.currency,
                    amount: sign * share,
                });
            }
        }

        Ok(Self {
            transaction_id: tx.id,
            deltas,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Sum of every delta; zero for any well-formed plan
    pub fn net(&self) -> Decimal {
        self.deltas.iter().map(|d| d.amount).sum()
    }

    /// Combined delta for one user, zero when unaffected
    pub fn delta_for(&self, user_id: &UserId) -> Decimal {
        self.deltas
            .iter()
            .filter(|d| &d.user_id == user_id)
            .map(|d| d.amount)
            .sum()
    }
}

/// Split `amount` into `parts` two-decimal shares that add back up to the
/// amount rounded to cents. Leftover cents go to the leading shares.
fn allocate(amount: Decimal, parts: usize) -> AppResult<Vec<Decimal>> {
    if parts == 0 {
        return Ok(Vec::new());
    }

    let cents = amount
        .round_dp(2)
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| AppError::Validation(format!("{} is too large to split", amount)))?
        .trunc();
    let count = Decimal::from(parts as u64);
    let base = (cents / count).floor();
    let remainder = cents - base * count;

    Ok((0..parts)
        .map(|i| {
            let extra = if Decimal::from(i as u64) < remainder {
                Decimal::ONE
            } else {
                Decimal::ZERO
            };
            (base + extra) / Decimal::ONE_HUNDRED
        })
        .collect())
}

/// A delta that reached the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDelta {
    pub delta: BalanceDelta,
    pub balance: Balance,
    /// Whether the adjustment had to open a new balance
    pub opened: bool,
}

/// A delta the ledger did not absorb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDelta {
    pub delta: BalanceDelta,
    pub reason: String,
}

/// Result of settling one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub transaction: Transaction,
    pub applied: Vec<AppliedDelta>,
    pub failed: Vec<FailedDelta>,
}

impl SettlementReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Settlement service coordinating transaction status and balances
pub struct SettlementService {
    transactions: Arc<TransactionService>,
    ledger: Arc<BalanceLedger>,
}

impl SettlementService {
    pub fn new(transactions: Arc<TransactionService>, ledger: Arc<BalanceLedger>) -> Self {
        Self {
            transactions,
            ledger,
        }
    }

    /// Mark the transaction settled and apply its plan to the ledger
    pub async fn settle(&self, transaction_id: Uuid) -> AppResult<SettlementReport> {
        // Refuse before the status flips if the amount cannot be split
        SettlementPlan::for_transaction(&self.transactions.get(transaction_id).await?)?;

        let transaction = self
            .transactions
            .set_status(transaction_id, TransactionStatus::Settled)
            .await?;

        let plan = SettlementPlan::for_transaction(&transaction)?;
        info!(
            "Settling transaction {} ({} deltas)",
            transaction_id,
            plan.deltas.len()
        );

        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for delta in plan.deltas {
            match self
                .ledger
                .adjust(&delta.user_id, delta.amount, delta.currency)
                .await
            {
                Ok(AdjustOutcome::Applied(balance)) => applied.push(AppliedDelta {
                    delta,
                    balance,
                    opened: false,
                }),
                Ok(AdjustOutcome::Opened(balance)) => applied.push(AppliedDelta {
                    delta,
                    balance,
                    opened: true,
                }),
                Ok(AdjustOutcome::Rejected) => {
                    warn!(
                        "Settlement of {}: no {} balance to debit for {}",
                        transaction_id, delta.currency, delta.user_id
                    );
                    failed.push(FailedDelta {
                        reason: format!("no {} balance to debit", delta.currency),
                        delta,
                    });
                }
                Err(e) => {
                    error!(
                        "Settlement of {}: adjusting {} failed: {}",
                        transaction_id, delta.user_id, e
                    );
                    failed.push(FailedDelta {
                        reason: e.to_string(),
                        delta,
                    });
                }
            }
        }

        Ok(SettlementReport {
            transaction,
            applied,
            failed,
        })
    }

    /// Cancel a pending transaction; balances are never touched
    pub async fn cancel(&self, transaction_id: Uuid) -> AppResult<Transaction> {
        self.transactions
            .set_status(transaction_id, TransactionStatus::Cancelled)
            .await
    }
}
