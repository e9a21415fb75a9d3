//! Ledger error taxonomy
//!
//! Every failure that leaves the core is one of these variants. Store
//! detail is logged where it happens and never carried in the message.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Validation Errors ===
    #[error("{0}")]
    InvalidInput(String),

    #[error("account id must be positive")]
    InvalidAccountId,

    #[error("amount must be greater than 0")]
    InvalidAmount,

    #[error("amount would overflow balance")]
    AmountTooLarge,

    #[error("cannot transfer to same account")]
    SameAccount,

    // === Account Errors ===
    #[error("account not found")]
    NotFound,

    #[error("from account not found")]
    SourceNotFound,

    #[error("destination account not found")]
    DestinationNotFound,

    #[error("insufficient funds")]
    InsufficientFunds,

    // === System Errors ===
    #[error("account is busy, retry later")]
    LockTimeout,

    #[error("service unavailable")]
    Unavailable,

    #[error("internal error")]
    CommitFailed,

    #[error("internal error")]
    Internal,
}

impl LedgerError {
    /// Stable code for logs and clients
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::InvalidAccountId => "INVALID_ACCOUNT_ID",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::AmountTooLarge => "AMOUNT_TOO_LARGE",
            LedgerError::SameAccount => "SAME_ACCOUNT",
            LedgerError::NotFound => "ACCOUNT_NOT_FOUND",
            LedgerError::SourceNotFound => "SOURCE_ACCOUNT_NOT_FOUND",
            LedgerError::DestinationNotFound => "DESTINATION_ACCOUNT_NOT_FOUND",
            LedgerError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            LedgerError::LockTimeout => "LOCK_TIMEOUT",
            LedgerError::Unavailable => "SERVICE_UNAVAILABLE",
            LedgerError::CommitFailed => "COMMIT_FAILED",
            LedgerError::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::InvalidInput(_)
            | LedgerError::InvalidAccountId
            | LedgerError::InvalidAmount
            | LedgerError::AmountTooLarge
            | LedgerError::SameAccount
            | LedgerError::InsufficientFunds => 400,
            LedgerError::NotFound
            | LedgerError::SourceNotFound
            | LedgerError::DestinationNotFound => 404,
            LedgerError::LockTimeout | LedgerError::Unavailable => 503,
            LedgerError::CommitFailed | LedgerError::Internal => 500,
        }
    }

    /// Whether a caller may retry the same request after backing off.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::LockTimeout | LedgerError::Unavailable)
    }
}

/// Translate a store failure that the caller has no specific meaning for.
pub(crate) fn store_failure(op: &'static str, e: StoreError) -> LedgerError {
    match e {
        StoreError::LockTimeout => {
            tracing::warn!(op, "lock wait exceeded deadline");
            LedgerError::LockTimeout
        }
        StoreError::Unavailable(detail) => {
            tracing::error!(op, %detail, "store unavailable");
            LedgerError::Unavailable
        }
        StoreError::Overflow => LedgerError::AmountTooLarge,
        StoreError::InvalidInput(msg) => LedgerError::InvalidInput(msg),
        other => {
            tracing::error!(op, error = %other, "store operation failed");
            LedgerError::Internal
        }
    }
}
