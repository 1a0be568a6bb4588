//! Ledger error types
//!
//! Expected business outcomes are carried as `LedgerError::Rejected(ErrorCode)`.
//! Everything else (store unreachable, corrupted rows, timeouts) is a fault.

use serde::Serialize;
use thiserror::Error;

/// Business error codes returned by the lot issuer and the transfer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    SelfShipment,
    OrganizationNotFound,
    InsufficientStock,
    Forbidden,
    ReasonRequired,
    BatchNotFound,
    CodesNotOwned,
    AlreadyRecalled,
    DuplicateLotNumber,
    ProductNotFound,
    ProductInactive,
    InvalidQuantity,
    InvalidPhone,
    TreatmentNotFound,
}

impl ErrorCode {
    /// Wire form of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SelfShipment => "SELF_SHIPMENT",
            ErrorCode::OrganizationNotFound => "ORGANIZATION_NOT_FOUND",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ReasonRequired => "REASON_REQUIRED",
            ErrorCode::BatchNotFound => "BATCH_NOT_FOUND",
            ErrorCode::CodesNotOwned => "CODES_NOT_OWNED",
            ErrorCode::AlreadyRecalled => "ALREADY_RECALLED",
            ErrorCode::DuplicateLotNumber => "DUPLICATE_LOT_NUMBER",
            ErrorCode::ProductNotFound => "PRODUCT_NOT_FOUND",
            ErrorCode::ProductInactive => "PRODUCT_INACTIVE",
            ErrorCode::InvalidQuantity => "INVALID_QUANTITY",
            ErrorCode::InvalidPhone => "INVALID_PHONE",
            ErrorCode::TreatmentNotFound => "TREATMENT_NOT_FOUND",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::Forbidden => 403,
            ErrorCode::OrganizationNotFound
            | ErrorCode::BatchNotFound
            | ErrorCode::ProductNotFound
            | ErrorCode::TreatmentNotFound => 404,
            ErrorCode::DuplicateLotNumber | ErrorCode::AlreadyRecalled => 409,
            ErrorCode::SelfShipment
            | ErrorCode::ReasonRequired
            | ErrorCode::InvalidQuantity
            | ErrorCode::InvalidPhone => 400,
            ErrorCode::InsufficientStock
            | ErrorCode::CodesNotOwned
            | ErrorCode::ProductInactive => 422,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage layer faults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Corrupted row: {0}")]
    Corrupted(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e
            && db.is_unique_violation()
        {
            return StoreError::UniqueViolation(db.constraint().unwrap_or("unknown").to_string());
        }
        StoreError::Database(e.to_string())
    }
}

impl From<crate::core_types::ParseEnumError> for StoreError {
    fn from(e: crate::core_types::ParseEnumError) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by every ledger operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Expected business outcome; nothing was mutated
    #[error("Rejected: {0}")]
    Rejected(ErrorCode),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The transaction did not finish in time; the outcome is unknown
    #[error("Transaction timed out")]
    Timeout,

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Rejected(code) => code.as_str(),
            LedgerError::Store(_) => "DATABASE_ERROR",
            LedgerError::Timeout => "TIMEOUT",
            LedgerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Business code, if this is an expected outcome
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            LedgerError::Rejected(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::Rejected(_))
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Rejected(code) => code.http_status(),
            LedgerError::Timeout => 504,
            LedgerError::Store(_) | LedgerError::Internal(_) => 500,
        }
    }
}

impl From<ErrorCode> for LedgerError {
    fn from(code: ErrorCode) -> Self {
        LedgerError::Rejected(code)
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Store(StoreError::from(e))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
