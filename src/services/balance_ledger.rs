use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{
    check_amount, checked_total, convert_to_inr, AdjustOutcome, Balance, BalanceFilter,
    BalanceTotal, BalanceUpdate, Currency, NewBalance, Page, UserId,
};
use crate::repositories::BalanceRepository;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-user, per-currency balances
pub struct BalanceLedger {
    repo: Arc<dyn BalanceRepository>,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    pub fn new(repo: Arc<dyn BalanceRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn create(&self, input: NewBalance) -> AppResult<Balance> {
        if input.user_id.is_blank() {
            return Err(AppError::Validation("Balance owner must not be empty".to_string()));
        }
        check_amount("Balance amount", input.amount)?;

        let balance = Balance::new(input, self.clock.now());
        self.repo.insert(&balance).await?;

        info!(
            "Created balance {} for {} ({} {})",
            balance.id, balance.user_id, balance.amount, balance.currency
        );
        Ok(balance)
    }

    pub async fn list(&self, filter: &BalanceFilter, page: Page) -> AppResult<Vec<Balance>> {
        Ok(self.repo.find(filter, Some(page)).await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Balance> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Balance {} not found", id)))
    }

    /// Every balance the user owns, most recently active first
    pub async fn list_by_owner(&self, owner: &UserId) -> AppResult<Vec<Balance>> {
        let filter = BalanceFilter {
            user_id: Some(owner.clone()),
        };
        Ok(self.repo.find(&filter, None).await?)
    }

    pub async fn update(&self, id: Uuid, update: &BalanceUpdate) -> AppResult<Balance> {
        if let Some(amount) = update.amount {
            check_amount("Balance amount", amount)?;
        }

        self.repo
            .update(id, update, self.clock.now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Balance {} not found", id)))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let deleted = self.repo.delete(id).await?;
        if deleted {
            info!("Deleted balance {}", id);
        }
        Ok(deleted)
    }

    /// Sum of every balance the user holds, converted to INR
    pub async fn total_for_owner(&self, owner: &UserId) -> AppResult<BalanceTotal> {
        let converted = self
            .list_by_owner(owner)
            .await?
            .iter()
            .map(|b| convert_to_inr(b.amount, b.currency))
            .collect::<AppResult<Vec<_>>>()?;
        let total_balance = checked_total(converted)?;

        Ok(BalanceTotal {
            user_id: owner.clone(),
            total_balance,
            currency: Currency::Inr,
        })
    }

    /// Add `delta` to the user's canonical balance in `currency`
    pub async fn adjust(
        &self,
        owner: &UserId,
        delta: Decimal,
        currency: Currency,
    ) -> AppResult<AdjustOutcome> {
        if owner.is_blank() {
            return Err(AppError::Validation("Balance owner must not be empty".to_string()));
        }
        check_amount("Adjustment", delta)?;

        let outcome = self
            .repo
            .increment_or_insert(owner, currency, delta, self.clock.now())
            .await?;

        match &outcome {
            AdjustOutcome::Applied(balance) => {
                debug!("Adjusted {} {} by {} -> {}", owner, currency, delta, balance.amount)
            }
            AdjustOutcome::Opened(balance) => {
                info!("Opened {} balance {} for {} with {}", currency, balance.id, owner, delta)
            }
            AdjustOutcome::Rejected => {
                warn!("Rejected adjustment of {} {} for {}: no balance", delta, currency, owner)
            }
        }

        Ok(outcome)
    }
}
