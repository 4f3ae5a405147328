//! Store Error Types
//!
//! PostgreSQL failures are classified by SQLSTATE: check and foreign-key
//! violations carry the violated constraint name, a `lock_timeout` expiry
//! becomes `LockTimeout`, and anything unrecognised stays a raw `Database`
//! error. Only lock timeouts and raw database errors are transient.

use thiserror::Error;

use crate::core_types::{AccountId, Amount};

/// PostgreSQL SQLSTATE: foreign_key_violation
const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";
/// PostgreSQL SQLSTATE: check_violation
const SQLSTATE_CHECK_VIOLATION: &str = "23514";
/// PostgreSQL SQLSTATE: lock_not_available (raised by `lock_timeout`)
const SQLSTATE_LOCK_NOT_AVAILABLE: &str = "55P03";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by ledger stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Balance of account {account_id} would become negative ({balance})")]
    NegativeBalance { account_id: AccountId, balance: Amount },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    #[error("Lock wait timeout: {0}")]
    LockTimeout(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether retrying the whole unit may succeed
    ///
    /// Constraint failures are deterministic; everything else (connection
    /// loss, lock-wait timeout, pool exhaustion) is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::LockTimeout(_) | StoreError::Database(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let classified = e.as_database_error().and_then(|db_err| {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some(SQLSTATE_FOREIGN_KEY_VIOLATION) => {
                    Some(StoreError::ForeignKeyViolation(constraint))
                }
                Some(SQLSTATE_CHECK_VIOLATION) => Some(StoreError::CheckViolation(constraint)),
                Some(SQLSTATE_LOCK_NOT_AVAILABLE) => {
                    Some(StoreError::LockTimeout(db_err.message().to_string()))
                }
                _ => None,
            }
        });

        classified.unwrap_or(StoreError::Database(e))
    }
}
