//! Fault-injecting store for testing
//!
//! Wraps a [`MemoryLedgerStore`] and fails one chosen write step of a
//! transfer unit, so tests can check that nothing of the unit survives.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::memory::{MemoryLedgerStore, MemoryTx};
use super::{AccountStore, EntryStore, StoreError, StoreResult, TransferStore, TxManager};
use crate::core_types::{AccountId, Amount, EntryId, TransferId};
use crate::models::{Account, Entry, NewAccount, Transfer};

/// Write step at which the next unit fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateTransfer,
    DebitEntry,
    CreditEntry,
    FirstBalanceUpdate,
    SecondBalanceUpdate,
    Commit,
}

impl FailPoint {
    pub const ALL: [FailPoint; 6] = [
        FailPoint::CreateTransfer,
        FailPoint::DebitEntry,
        FailPoint::CreditEntry,
        FailPoint::FirstBalanceUpdate,
        FailPoint::SecondBalanceUpdate,
        FailPoint::Commit,
    ];
}

pub struct FaultyStore {
    inner: MemoryLedgerStore,
    fail_at: Mutex<Option<FailPoint>>,
    entry_writes: AtomicUsize,
    balance_writes: AtomicUsize,
    rollback_count: AtomicUsize,
}

impl Default for FaultyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            fail_at: Mutex::new(None),
            entry_writes: AtomicUsize::new(0),
            balance_writes: AtomicUsize::new(0),
            rollback_count: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_at(&self, point: Option<FailPoint>) {
        *self.fail_at.lock().unwrap() = point;
        self.entry_writes.store(0, Ordering::SeqCst);
        self.balance_writes.store(0, Ordering::SeqCst);
    }

    pub fn rollback_count(&self) -> usize {
        self.rollback_count.load(Ordering::SeqCst)
    }

    fn should_fail(&self, point: FailPoint) -> bool {
        *self.fail_at.lock().unwrap() == Some(point)
    }

    fn injected() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl TxManager for FaultyStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        self.inner.begin().await
    }

    async fn commit(&self, tx: MemoryTx) -> StoreResult<()> {
        if self.should_fail(FailPoint::Commit) {
            // A failed commit leaves nothing behind
            self.inner.rollback(tx).await?;
            return Err(Self::injected());
        }
        self.inner.commit(tx).await
    }

    async fn rollback(&self, tx: MemoryTx) -> StoreResult<()> {
        self.rollback_count.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback(tx).await
    }
}

#[async_trait]
impl AccountStore<MemoryTx> for FaultyStore {
    async fn create_account(&self, tx: &mut MemoryTx, account: &NewAccount) -> StoreResult<Account> {
        self.inner.create_account(tx, account).await
    }

    async fn get_account(&self, tx: &mut MemoryTx, id: AccountId) -> StoreResult<Option<Account>> {
        self.inner.get_account(tx, id).await
    }

    async fn get_account_for_update(
        &self,
        tx: &mut MemoryTx,
        id: AccountId,
    ) -> StoreResult<Option<Account>> {
        self.inner.get_account_for_update(tx, id).await
    }

    async fn update_account_balance(
        &self,
        tx: &mut MemoryTx,
        id: AccountId,
        new_balance: Amount,
    ) -> StoreResult<Account> {
        let n = self.balance_writes.fetch_add(1, Ordering::SeqCst);
        let point = if n == 0 {
            FailPoint::FirstBalanceUpdate
        } else {
            FailPoint::SecondBalanceUpdate
        };
        if self.should_fail(point) {
            return Err(Self::injected());
        }
        self.inner.update_account_balance(tx, id, new_balance).await
    }
}

#[async_trait]
impl EntryStore<MemoryTx> for FaultyStore {
    async fn create_entry(
        &self,
        tx: &mut MemoryTx,
        account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Entry> {
        let n = self.entry_writes.fetch_add(1, Ordering::SeqCst);
        let point = if n == 0 {
            FailPoint::DebitEntry
        } else {
            FailPoint::CreditEntry
        };
        if self.should_fail(point) {
            return Err(Self::injected());
        }
        self.inner.create_entry(tx, account_id, amount).await
    }

    async fn get_entry(&self, tx: &mut MemoryTx, id: EntryId) -> StoreResult<Option<Entry>> {
        self.inner.get_entry(tx, id).await
    }

    async fn list_entries(&self, tx: &mut MemoryTx, account_id: AccountId) -> StoreResult<Vec<Entry>> {
        self.inner.list_entries(tx, account_id).await
    }
}

#[async_trait]
impl TransferStore<MemoryTx> for FaultyStore {
    async fn create_transfer(
        &self,
        tx: &mut MemoryTx,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Transfer> {
        if self.should_fail(FailPoint::CreateTransfer) {
            return Err(Self::injected());
        }
        self.inner
            .create_transfer(tx, from_account_id, to_account_id, amount)
            .await
    }

    async fn get_transfer(&self, tx: &mut MemoryTx, id: TransferId) -> StoreResult<Option<Transfer>> {
        self.inner.get_transfer(tx, id).await
    }

    async fn list_transfers(
        &self,
        tx: &mut MemoryTx,
        account_id: AccountId,
    ) -> StoreResult<Vec<Transfer>> {
        self.inner.list_transfers(tx, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_store_injects_nothing() {
        let store = FaultyStore::default();
        let mut tx = store.begin().await.unwrap();
        let account = store
            .create_account(&mut tx, &NewAccount::new("carol", 10, "USD"))
            .await
            .unwrap();
        store.create_entry(&mut tx, account.id, 5).await.unwrap();
        store.update_account_balance(&mut tx, account.id, 15).await.unwrap();
        store.commit(tx).await.unwrap();
        assert_eq!(store.rollback_count(), 0);
    }
}
