//! bank_ledger - Account ledger with atomic transfers
//!
//! Accounts hold balances, transfers move money between them, and entries
//! record the debit and credit halves of each transfer.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier and amount aliases
//! - [`models`] - Account, Entry and Transfer rows
//! - [`store`] - Transactional store capabilities (PostgreSQL and in-memory)
//! - [`transfer`] - Transfer engine with ascending-id lock ordering
//! - [`db`] - Connection pool and schema
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod models;
pub mod store;
pub mod transfer;

pub mod config;
pub mod db;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Amount, EntryId, TransferId};
pub use models::{Account, Entry, NewAccount, Transfer};
pub use store::{
    AccountStore, EntryStore, MemoryLedgerStore, PgLedgerStore, StoreError, TransferStore,
    TxManager,
};
pub use transfer::{TransferEngine, TransferError, TransferRequest, TransferResult};
