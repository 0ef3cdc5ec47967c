use super::SettlementPlan;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{
    accumulate, check_amount, convert_to_inr, Currency, GroupId, NewTransaction, Page, Transaction,
    TransactionFilter, TransactionStatus, TransactionSummary, TransactionType, TransactionUpdate,
    UserId,
};
use crate::repositories::TransactionRepository;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Transaction store: records, lifecycle and per-owner summaries
pub struct TransactionService {
    repo: Arc<dyn TransactionRepository>,
    clock: Arc<dyn Clock>,
}

impl TransactionService {
    pub fn new(repo: Arc<dyn TransactionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Record a new pending transaction. Balances are not touched.
    pub async fn create(&self, input: NewTransaction) -> AppResult<Transaction> {
        if input.user_id.is_blank() {
            return Err(AppError::Validation("Transaction owner must not be empty".to_string()));
        }
        validate_title(&input.title)?;
        validate_amount(input.amount)?;

        let transaction = Transaction::new(input, self.clock.now());
        self.repo.insert(&transaction).await?;

        info!(
            "Created {} transaction {} for {} ({} {})",
            transaction.transaction_type,
            transaction.id,
            transaction.user_id,
            transaction.amount,
            transaction.currency
        );
        Ok(transaction)
    }

    pub async fn list(&self, filter: &TransactionFilter, page: Page) -> AppResult<Vec<Transaction>> {
        Ok(self.repo.find(filter, Some(page)).await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Transaction> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list_by_owner(&self, owner: &UserId, page: Page) -> AppResult<Vec<Transaction>> {
        self.list(&TransactionFilter::by_owner(owner.clone()), page).await
    }

    pub async fn list_by_group(&self, group: &GroupId, page: Page) -> AppResult<Vec<Transaction>> {
        self.list(&TransactionFilter::by_group(group.clone()), page).await
    }

    /// Merge the provided fields. Amount, currency, type and participants
    /// are frozen once the transaction leaves `pending`.
    pub async fn update(&self, id: Uuid, update: &TransactionUpdate) -> AppResult<Transaction> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(amount) = update.amount {
            validate_amount(amount)?;
        }

        let mut transaction = self.get(id).await?;
        if update.touches_financials() && transaction.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "Cannot change amount, currency, type or participants of a {} transaction",
                transaction.status
            )));
        }

        transaction.apply(update, self.clock.now());

        if !self.repo.update_details(&transaction).await? {
            // Either deleted or its status moved since we read it
            return match self.repo.find_by_id(id).await? {
                None => Err(not_found(id)),
                Some(current) => Err(AppError::Conflict(format!(
                    "Transaction {} changed to {} during update",
                    id, current.status
                ))),
            };
        }

        Ok(transaction)
    }

    /// Move a pending transaction to `settled` or `cancelled`
    pub async fn set_status(&self, id: Uuid, next: TransactionStatus) -> AppResult<Transaction> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(next) {
            warn!("Rejected transition {} -> {} for transaction {}", current.status, next, id);
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        match self
            .repo
            .update_status(id, current.status, next, self.clock.now())
            .await?
        {
            Some(updated) => {
                info!("Transaction {} is now {}", id, next);
                Ok(updated)
            }
            None => match self.repo.find_by_id(id).await? {
                None => Err(not_found(id)),
                Some(raced) => Err(AppError::InvalidTransition {
                    from: raced.status,
                    to: next,
                }),
            },
        }
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let deleted = self.repo.delete(id).await?;
        if deleted {
            info!("Deleted transaction {}", id);
        }
        Ok(deleted)
    }

    /// Counts and INR totals over every transaction the user created
    pub async fn summary_for_owner(&self, owner: &UserId) -> AppResult<TransactionSummary> {
        let transactions = self
            .repo
            .find(&TransactionFilter::by_owner(owner.clone()), None)
            .await?;

        let mut count_by_status: BTreeMap<TransactionStatus, u64> =
            TransactionStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut total_by_status: BTreeMap<TransactionStatus, Decimal> =
            TransactionStatus::ALL.iter().map(|s| (*s, Decimal::ZERO)).collect();
        let mut count_by_type: BTreeMap<TransactionType, u64> =
            TransactionType::ALL.iter().map(|t| (*t, 0)).collect();
        let mut total_by_type: BTreeMap<TransactionType, Decimal> =
            TransactionType::ALL.iter().map(|t| (*t, Decimal::ZERO)).collect();
        let mut net_amount = Decimal::ZERO;

        for tx in &transactions {
            let inr = convert_to_inr(tx.amount, tx.currency)?;

            *count_by_status.entry(tx.status).or_default() += 1;
            accumulate(total_by_status.entry(tx.status).or_default(), inr)?;
            *count_by_type.entry(tx.transaction_type).or_default() += 1;
            accumulate(total_by_type.entry(tx.transaction_type).or_default(), inr)?;

            if tx.status == TransactionStatus::Settled {
                let own_delta = SettlementPlan::for_transaction(tx)?.delta_for(owner);
                accumulate(&mut net_amount, convert_to_inr(own_delta, tx.currency)?)?;
            }
        }

        Ok(TransactionSummary {
            user_id: owner.clone(),
            total_count: transactions.len() as u64,
            count_by_status,
            total_by_status,
            count_by_type,
            total_by_type,
            net_amount,
            currency: Currency::Inr,
        })
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Transaction {} not found", id))
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Transaction title must not be empty".to_string()));
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "Transaction amount must be positive, got {}",
            amount
        )));
    }
    check_amount("Transaction amount", amount)
}
