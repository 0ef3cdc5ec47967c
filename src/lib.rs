//! PaisaSplit Backend Library
//!
//! Ledger core for the PaisaSplit expense-sharing app: balances,
//! transactions, the activity feed, spending reports and support content.
//! Transport and authentication live elsewhere; this crate exposes the
//! services they call.

pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod telemetry;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repositories::*;
use services::*;
use sqlx::PgPool;
use std::sync::Arc;

/// Repository handles backing the services
#[derive(Clone)]
pub struct Repositories {
    pub balances: Arc<dyn BalanceRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub reports: Arc<dyn SpendingReportRepository>,
    pub faqs: Arc<dyn FaqRepository>,
    pub groups: Arc<dyn GroupDirectory>,
}

impl Repositories {
    /// Every repository served by one in-process store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            balances: store.clone(),
            transactions: store.clone(),
            reports: store.clone(),
            faqs: store.clone(),
            groups: store,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            balances: Arc::new(PgBalanceRepository::new(pool.clone())),
            transactions: Arc::new(PgTransactionRepository::new(pool.clone())),
            reports: Arc::new(PgSpendingReportRepository::new(pool.clone())),
            faqs: Arc::new(PgFaqRepository::new(pool.clone())),
            groups: Arc::new(PgGroupDirectory::new(pool)),
        }
    }
}

/// Application state containing all services
pub struct AppState {
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub balances: Arc<BalanceLedger>,
    pub transactions: Arc<TransactionService>,
    pub activities: Arc<ActivityProjector>,
    pub reports: Arc<SpendingReportAggregator>,
    pub settlements: Arc<SettlementService>,
    pub support: Arc<SupportService>,
}

impl AppState {
    /// Wire services over the given repositories with the default categorizer
    pub fn new(config: AppConfig, repos: Repositories, clock: Arc<dyn Clock>) -> Self {
        Self::with_categorizer(config, repos, clock, Arc::new(KeywordCategorizer::default()))
    }

    pub fn with_categorizer(
        config: AppConfig,
        repos: Repositories,
        clock: Arc<dyn Clock>,
        categorizer: Arc<dyn Categorizer>,
    ) -> Self {
        let balances = Arc::new(BalanceLedger::new(repos.balances.clone(), clock.clone()));
        let transactions = Arc::new(TransactionService::new(
            repos.transactions.clone(),
            clock.clone(),
        ));
        let activities = Arc::new(ActivityProjector::new(
            repos.transactions.clone(),
            repos.groups.clone(),
            clock.clone(),
        ));
        let reports = Arc::new(SpendingReportAggregator::new(
            repos.transactions.clone(),
            repos.reports.clone(),
            categorizer,
            clock.clone(),
        ));
        let settlements = Arc::new(SettlementService::new(transactions.clone(), balances.clone()));
        let support = Arc::new(SupportService::new(repos.faqs.clone(), clock.clone()));

        Self {
            config,
            clock,
            balances,
            transactions,
            activities,
            reports,
            settlements,
            support,
        }
    }

    /// State over a fresh in-process store
    pub fn in_memory(config: AppConfig, clock: Arc<dyn Clock>) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Self::new(config, Repositories::memory(store.clone()), clock);
        (state, store)
    }

    pub fn postgres(config: AppConfig, pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self::new(config, Repositories::postgres(pool), clock)
    }
}
