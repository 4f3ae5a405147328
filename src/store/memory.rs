//! In-memory ledger store
//!
//! Process-local backend with the same transactional semantics the engine
//! relies on from PostgreSQL:
//!
//! - **Row locks**: one async mutex per account; a transaction keeps every
//!   lock it takes until commit/rollback.
//! - **Isolation**: writes are buffered in the [`MemoryTx`] and published
//!   atomically on commit. Other transactions only ever see committed rows.
//! - **Lock wait timeout**: a lock wait longer than the configured timeout
//!   fails with [`StoreError::LockTimeout`] instead of hanging forever.
//! - **Constraints**: `balance >= 0` and account foreign keys are checked on
//!   every write.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::{debug, warn};

use super::error::{StoreError, StoreResult};
use super::{
    AccountStore, ENTRY_ACCOUNT_FK, EntryStore, TRANSFER_FROM_ACCOUNT_FK,
    TRANSFER_TO_ACCOUNT_FK, TransferStore, TxManager,
};
use crate::core_types::{AccountId, Amount, EntryId, TransferId};
use crate::models::{Account, Entry, NewAccount, Transfer};

/// Default bound on a single row-lock wait
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Committed rows, visible to every transaction
#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<EntryId, Entry>,
    transfers: BTreeMap<TransferId, Transfer>,
}

/// Open transaction on a [`MemoryLedgerStore`]
///
/// Dropping it without commit discards its writes and releases its locks.
pub struct MemoryTx {
    id: u64,
    locks: HashMap<AccountId, OwnedMutexGuard<()>>,
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl MemoryTx {
    /// Number of row locks currently held
    pub fn locks_held(&self) -> usize {
        self.locks.len()
    }
}

/// In-memory store for accounts, entries and transfers
pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<RowLock<()>>>>,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
    next_tx_id: AtomicU64,
    lock_timeout: Duration,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            row_locks: Mutex::new(HashMap::new()),
            next_account_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
            next_transfer_id: AtomicI64::new(1),
            next_tx_id: AtomicU64::new(1),
            lock_timeout,
        }
    }

    fn read_tables(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".to_string()))
    }

    fn row_lock(&self, id: AccountId) -> StoreResult<Arc<RowLock<()>>> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".to_string()))?;
        Ok(locks.entry(id).or_default().clone())
    }

    /// Row as seen by `tx`: its own pending write, else the committed row
    fn visible_account(&self, tx: &MemoryTx, id: AccountId) -> StoreResult<Option<Account>> {
        if let Some(staged) = tx.accounts.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.read_tables()?.accounts.get(&id).cloned())
    }

    /// Acquire the row lock for `id` unless `tx` already holds it
    async fn lock_row(&self, tx: &mut MemoryTx, id: AccountId) -> StoreResult<()> {
        if tx.locks.contains_key(&id) {
            return Ok(());
        }

        let lock = self.row_lock(id)?;
        let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                warn!(tx_id = tx.id, account_id = id, "Row lock wait timed out");
                StoreError::LockTimeout(format!("account {id}"))
            })?;

        tx.locks.insert(id, guard);
        Ok(())
    }
}

#[async_trait]
impl TxManager for MemoryLedgerStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        Ok(MemoryTx {
            id: self.next_tx_id.fetch_add(1, Ordering::SeqCst),
            locks: HashMap::new(),
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        })
    }

    async fn commit(&self, mut tx: MemoryTx) -> StoreResult<()> {
        {
            let mut tables = self
                .tables
                .write()
                .map_err(|_| StoreError::Internal("memory store lock poisoned".to_string()))?;

            tables.accounts.append(&mut tx.accounts);
            for entry in tx.entries.drain(..) {
                tables.entries.insert(entry.id, entry);
            }
            for transfer in tx.transfers.drain(..) {
                tables.transfers.insert(transfer.id, transfer);
            }
        }

        debug!(tx_id = tx.id, locks = tx.locks.len(), "Memory tx committed");
        // Row locks are released only after the new rows are visible
        drop(tx);
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> StoreResult<()> {
        debug!(tx_id = tx.id, "Memory tx rolled back");
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl AccountStore<MemoryTx> for MemoryLedgerStore {
    async fn create_account(&self, tx: &mut MemoryTx, account: &NewAccount) -> StoreResult<Account> {
        if account.balance < 0 {
            return Err(StoreError::CheckViolation(
                super::BALANCE_NONNEGATIVE.to_string(),
            ));
        }

        let created = Account {
            id: self.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: account.owner.clone(),
            balance: account.balance,
            currency: account.currency.clone(),
            created_at: Utc::now(),
        };
        tx.accounts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn get_account(&self, tx: &mut MemoryTx, id: AccountId) -> StoreResult<Option<Account>> {
        self.visible_account(tx, id)
    }

    async fn get_account_for_update(
        &self,
        tx: &mut MemoryTx,
        id: AccountId,
    ) -> StoreResult<Option<Account>> {
        if self.visible_account(tx, id)?.is_none() {
            return Ok(None);
        }

        self.lock_row(tx, id).await?;
        // Re-read: the previous holder may have committed while we waited
        self.visible_account(tx, id)
    }

    async fn update_account_balance(
        &self,
        tx: &mut MemoryTx,
        id: AccountId,
        new_balance: Amount,
    ) -> StoreResult<Account> {
        if self.visible_account(tx, id)?.is_none() {
            return Err(StoreError::AccountNotFound(id));
        }

        // UPDATE takes the row lock implicitly
        self.lock_row(tx, id).await?;

        let mut account = self
            .visible_account(tx, id)?
            .ok_or(StoreError::AccountNotFound(id))?;

        if new_balance < 0 {
            return Err(StoreError::NegativeBalance {
                account_id: id,
                balance: new_balance,
            });
        }

        account.balance = new_balance;
        tx.accounts.insert(id, account.clone());
        Ok(account)
    }
}

#[async_trait]
impl EntryStore<MemoryTx> for MemoryLedgerStore {
    async fn create_entry(
        &self,
        tx: &mut MemoryTx,
        account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Entry> {
        if self.visible_account(tx, account_id)?.is_none() {
            return Err(StoreError::ForeignKeyViolation(ENTRY_ACCOUNT_FK.to_string()));
        }

        let entry = Entry {
            id: self.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        tx.entries.push(entry.clone());

        Ok(entry)
    }

    async fn get_entry(&self, tx: &mut MemoryTx, id: EntryId) -> StoreResult<Option<Entry>> {
        if let Some(entry) = tx.entries.iter().find(|e| e.id == id) {
            return Ok(Some(entry.clone()));
        }
        Ok(self.read_tables()?.entries.get(&id).cloned())
    }

    async fn list_entries(&self, tx: &mut MemoryTx, account_id: AccountId) -> StoreResult<Vec<Entry>> {
        let mut entries: Vec<Entry> = self
            .read_tables()?
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        entries.extend(tx.entries.iter().filter(|e| e.account_id == account_id).cloned());
        entries.sort_by_key(|e| e.id);

        Ok(entries)
    }
}

#[async_trait]
impl TransferStore<MemoryTx> for MemoryLedgerStore {
    async fn create_transfer(
        &self,
        tx: &mut MemoryTx,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Transfer> {
        if self.visible_account(tx, from_account_id)?.is_none() {
            return Err(StoreError::ForeignKeyViolation(
                TRANSFER_FROM_ACCOUNT_FK.to_string(),
            ));
        }
        if self.visible_account(tx, to_account_id)?.is_none() {
            return Err(StoreError::ForeignKeyViolation(
                TRANSFER_TO_ACCOUNT_FK.to_string(),
            ));
        }
        if amount <= 0 {
            return Err(StoreError::CheckViolation("transfers_amount_positive".to_string()));
        }

        let transfer = Transfer {
            id: self.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        tx.transfers.push(transfer.clone());

        Ok(transfer)
    }

    async fn get_transfer(&self, tx: &mut MemoryTx, id: TransferId) -> StoreResult<Option<Transfer>> {
        if let Some(transfer) = tx.transfers.iter().find(|t| t.id == id) {
            return Ok(Some(transfer.clone()));
        }
        Ok(self.read_tables()?.transfers.get(&id).cloned())
    }

    async fn list_transfers(
        &self,
        tx: &mut MemoryTx,
        account_id: AccountId,
    ) -> StoreResult<Vec<Transfer>> {
        let mut transfers: Vec<Transfer> = self
            .read_tables()?
            .transfers
            .values()
            .filter(|t| t.touches(account_id))
            .cloned()
            .collect();
        transfers.extend(tx.transfers.iter().filter(|t| t.touches(account_id)).cloned());
        transfers.sort_by_key(|t| t.id);

        Ok(transfers)
    }
}
