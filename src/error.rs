use crate::database::DatabaseError;
use crate::models::TransactionStatus;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Illegal transaction status change
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A concurrent writer won; the caller may retry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage substrate failures
    #[error("Persistence error: {0}")]
    Persistence(RepositoryError),

    /// Database setup errors (pool, migrations)
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => 409,
            AppError::Serialization(_) => 422,
            AppError::Persistence(_) | AppError::Database(_) | AppError::Config(_) => 500,
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Lock or serialization failure
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Stored value that no longer maps onto the domain model
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Duplicate(msg) => AppError::Conflict(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            other => AppError::Persistence(other),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // Check for common PostgreSQL error codes
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // Unique violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // Foreign key / check constraint violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    // Serialization failure, deadlock, lock not available
                    Some("40001") | Some("40P01") | Some("55P03") => {
                        RepositoryError::Conflict(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        RepositoryError::from(err).into()
    }
}
