use uuid::Uuid;

/// Unified error type for every service operation.
///
/// All variants are raised synchronously from inside the active transaction,
/// which then rolls back fully; callers never observe partial stock or
/// allocation changes.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A stock reversal would drive a product's on-hand quantity below zero.
    #[error("Negative stock: {0}")]
    NegativeStock(String),

    /// A sale item mutation requires more stock than is on hand.
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// A sale with payments allocated to it cannot be cancelled.
    #[error("Sale {0} has payments allocated and cannot be cancelled")]
    PaidSaleCancellation(Uuid),

    /// The target sale is cancelled; its items and allocations are frozen.
    #[error("Sale is cancelled: {0}")]
    SaleCancelled(String),

    /// Allocation amount exceeds the payment's unallocated amount.
    #[error("Over-allocation: {0}")]
    OverAllocation(String),

    /// Allocation amount exceeds the sale's outstanding balance.
    #[error("Allocation exceeds sale balance: {0}")]
    ExceedsSaleBalance(String),

    #[error("Folio generation failed: {0}")]
    FolioGeneration(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<sea_orm::TransactionError<ServiceError>> for ServiceError {
    fn from(err: sea_orm::TransactionError<ServiceError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            sea_orm::TransactionError::Transaction(service_err) => service_err,
        }
    }
}

impl ServiceError {
    /// Whether the underlying database error is a unique-constraint violation.
    ///
    /// Folio generation retries document inserts that raced on the same
    /// (type, day) sequence; item upserts use it to report duplicates.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ServiceError::DatabaseError(db_err) => matches!(
                db_err.sql_err(),
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
            ),
            _ => false,
        }
    }
}
