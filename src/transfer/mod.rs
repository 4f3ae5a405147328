//! Account-to-Account Transfers
//!
//! Moves an amount between two accounts of the ledger as a single atomic
//! unit: one transfer record, one debit entry, one credit entry and two
//! balance updates, all committed together or not at all.
//!
//! # Unit Stages
//!
//! ```text
//! STARTED → ENTRIES_WRITTEN → BALANCES_UPDATED → COMMITTED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All-or-nothing**: any failure rolls back every write of the unit
//! 2. **Non-negative balances**: enforced by the store, surfaced as `InsufficientFunds`
//! 3. **Ordered locking**: account rows are always locked in ascending id
//! 4. **Zero-sum**: the two entries of a transfer cancel out

pub mod engine;
pub mod error;
pub mod lock_order;
pub mod state;
pub mod types;


pub use engine::TransferEngine;
pub use error::TransferError;
pub use lock_order::{BalanceUpdate, lock_order};
pub use state::TransferStage;
pub use types::{TransferRequest, TransferResult};
