//! Transfer Error Types
//!
//! Every failure rolls back the whole unit; the variant tells the caller
//! whether the request itself was wrong or the store was unavailable.

use thiserror::Error;

use crate::core_types::AccountId;
use crate::store::StoreError;

/// Transfer error types
#[derive(Error, Debug)]
pub enum TransferError {
    /// Non-positive amount, same-account transfer, currency mismatch,
    /// balance overflow, or a row rejected by a check constraint
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Insufficient funds in account {account_id}")]
    InsufficientFunds { account_id: AccountId },

    /// Connection loss, lock-wait timeout, failed commit. Safe to retry.
    #[error("Transient store failure: {0}")]
    TransientStoreFailure(#[source] StoreError),

    /// Store fault that fails the same way on every attempt
    #[error("Store failure: {0}")]
    StoreFailure(#[source] StoreError),
}

impl TransferError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        TransferError::InvalidArgument(msg.into())
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidArgument(_) => "INVALID_ARGUMENT",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::TransientStoreFailure(_) => "TRANSIENT_STORE_FAILURE",
            TransferError::StoreFailure(_) => "STORE_FAILURE",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidArgument(_) => 400,
            TransferError::AccountNotFound(_) => 404,
            TransferError::InsufficientFunds { .. } => 422,
            TransferError::TransientStoreFailure(_) => 503,
            TransferError::StoreFailure(_) => 500,
        }
    }

    /// Whether the caller may retry the whole transfer unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::TransientStoreFailure(_))
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(id) => TransferError::AccountNotFound(id),
            StoreError::NegativeBalance { account_id, .. } => {
                TransferError::InsufficientFunds { account_id }
            }
            StoreError::CheckViolation(constraint) => {
                TransferError::InvalidArgument(format!("constraint violated: {constraint}"))
            }
            other if other.is_transient() => TransferError::TransientStoreFailure(other),
            other => TransferError::StoreFailure(other),
        }
    }
}
