//! Domain models for the PaisaSplit ledger.
//!
//! Balances, transactions, spending reports and FAQ items are owned by this
//! crate. Users and groups are external and appear only as identifiers or
//! read-only records.

pub mod activity;
pub mod balance;
pub mod currency;
pub mod faq;
pub mod group;
pub mod ids;
pub mod page;
pub mod spending_report;
pub mod transaction;

// Re-export all models for convenient access
pub use activity::{ActivityFilter, ActivityItem, ActivityStats};
pub use balance::{AdjustOutcome, Balance, BalanceFilter, BalanceTotal, BalanceUpdate, NewBalance};
pub use currency::{
    accumulate, check_amount, checked_total, convert_to_inr, Currency, MAX_AMOUNT, MAX_AMOUNT_SCALE,
};
pub use faq::{FaqItem, FaqUpdate};
pub use group::{Group, GroupMember, GroupRef};
pub use ids::{GroupId, UserId};
pub use page::{Page, MAX_PAGE_LIMIT};
pub use spending_report::{SpendingCategory, SpendingReport, SpendingTrends};
pub use transaction::{
    Audience, NewTransaction, Transaction, TransactionFilter, TransactionStatus, TransactionSummary,
    TransactionType, TransactionUpdate,
};
