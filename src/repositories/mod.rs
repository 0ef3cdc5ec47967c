//! Persistence seam.
//!
//! Each entity gets a repository trait describing the document-store
//! operations the services need. `Pg*` types implement them over a Postgres
//! pool; `MemoryStore` implements all of them in-process.

pub mod balance_repository;
pub mod faq_repository;
pub mod group_directory;
pub mod memory;
pub mod spending_report_repository;
pub mod transaction_repository;

// Re-export all repositories for convenient access
pub use balance_repository::{BalanceRepository, PgBalanceRepository};
pub use faq_repository::{FaqRepository, PgFaqRepository};
pub use group_directory::{GroupDirectory, PgGroupDirectory};
pub use memory::MemoryStore;
pub use spending_report_repository::{PgSpendingReportRepository, SpendingReportRepository};
pub use transaction_repository::{PgTransactionRepository, TransactionRepository};

use crate::error::{AppError, RepositoryError};
use std::str::FromStr;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Parse an enum column stored as TEXT
pub(crate) fn parse_column<T>(value: &str, column: &str) -> RepoResult<T>
where
    T: FromStr<Err = AppError>,
{
    value
        .parse::<T>()
        .map_err(|e| RepositoryError::Corrupt(format!("{}: {}", column, e)))
}
