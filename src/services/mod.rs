pub mod activity_projector;
pub mod balance_ledger;
pub mod settlement;
pub mod spending_report;
pub mod support;
pub mod transaction_service;

pub use activity_projector::{ActivityProjector, RECENT_WINDOW_DAYS};
pub use balance_ledger::BalanceLedger;
pub use settlement::{
    AppliedDelta, BalanceDelta, FailedDelta, SettlementPlan, SettlementReport, SettlementService,
};
pub use spending_report::{
    counts_as_spending, CategoryLabel, Categorizer, KeywordCategorizer, SpendingReportAggregator,
};
pub use support::SupportService;
pub use transaction_service::TransactionService;
