//! Ledger store capabilities
//!
//! The transfer engine talks to persistence only through the narrow traits in
//! this module. Every store call takes the transaction handle produced by a
//! [`TxManager`], so a sequence of calls forms one all-or-nothing unit.
//!
//! # Backends
//!
//! - [`postgres::PgLedgerStore`] - PostgreSQL via sqlx (`FOR NO KEY UPDATE` row locks)
//! - [`memory::MemoryLedgerStore`] - in-process rows with per-account locks
//!
//! # Transaction handles
//!
//! Dropping a `Tx` without calling [`TxManager::commit`] discards every write
//! made through it and releases its row locks.

pub mod error;
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub mod mock;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryLedgerStore, MemoryTx};
pub use postgres::PgLedgerStore;

use async_trait::async_trait;

use crate::core_types::{AccountId, Amount, EntryId, TransferId};
use crate::models::{Account, Entry, NewAccount, Transfer};

/// CHECK constraint keeping `accounts.balance >= 0`
pub const BALANCE_NONNEGATIVE: &str = "balance_nonnegative";

/// Foreign key `entries.account_id -> accounts.id`
pub const ENTRY_ACCOUNT_FK: &str = "entries_account_fk";

/// Foreign key `transfers.from_account_id -> accounts.id`
pub const TRANSFER_FROM_ACCOUNT_FK: &str = "transfers_from_account_fk";

/// Foreign key `transfers.to_account_id -> accounts.id`
pub const TRANSFER_TO_ACCOUNT_FK: &str = "transfers_to_account_fk";

/// Transactional context factory
#[async_trait]
pub trait TxManager: Send + Sync {
    /// Transaction handle threaded through every store call of one unit
    type Tx: Send + 'static;

    /// Open a new transaction
    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Make every write of the unit durable and release its locks
    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;

    /// Discard every write of the unit and release its locks
    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()>;
}

/// Account persistence
#[async_trait]
pub trait AccountStore<Tx: Send + 'static>: Send + Sync {
    /// Insert a new account
    async fn create_account(&self, tx: &mut Tx, account: &NewAccount) -> StoreResult<Account>;

    /// Plain read, no lock taken
    async fn get_account(&self, tx: &mut Tx, id: AccountId) -> StoreResult<Option<Account>>;

    /// Read and take an exclusive row lock held until the transaction ends
    async fn get_account_for_update(
        &self,
        tx: &mut Tx,
        id: AccountId,
    ) -> StoreResult<Option<Account>>;

    /// Overwrite the balance
    ///
    /// # Errors
    /// - [`StoreError::NegativeBalance`] if `new_balance < 0`
    /// - [`StoreError::AccountNotFound`] if the row does not exist
    async fn update_account_balance(
        &self,
        tx: &mut Tx,
        id: AccountId,
        new_balance: Amount,
    ) -> StoreResult<Account>;
}

/// Append-only entry persistence
#[async_trait]
pub trait EntryStore<Tx: Send + 'static>: Send + Sync {
    async fn create_entry(
        &self,
        tx: &mut Tx,
        account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Entry>;

    async fn get_entry(&self, tx: &mut Tx, id: EntryId) -> StoreResult<Option<Entry>>;

    /// All entries of one account, oldest first
    async fn list_entries(&self, tx: &mut Tx, account_id: AccountId) -> StoreResult<Vec<Entry>>;
}

/// Transfer record persistence
#[async_trait]
pub trait TransferStore<Tx: Send + 'static>: Send + Sync {
    async fn create_transfer(
        &self,
        tx: &mut Tx,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Transfer>;

    async fn get_transfer(&self, tx: &mut Tx, id: TransferId) -> StoreResult<Option<Transfer>>;

    /// Transfers where `account_id` is either side, oldest first
    async fn list_transfers(
        &self,
        tx: &mut Tx,
        account_id: AccountId,
    ) -> StoreResult<Vec<Transfer>>;
}
