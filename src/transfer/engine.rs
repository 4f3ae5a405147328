//! Transfer Engine
//!
//! Moves money between two accounts as one all-or-nothing unit:
//!
//! 1. open a transaction
//! 2. create the transfer record
//! 3. create the debit entry (`-amount`) for the source
//! 4. create the credit entry (`+amount`) for the destination
//! 5. update both balances, locking rows in ascending account id
//! 6. commit
//!
//! Any failure rolls the unit back, so no partial ledger state is ever
//! observable. The engine keeps no state between calls; all serialization
//! happens on account row locks inside the store.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::lock_order::{BalanceUpdate, lock_order};
use super::state::TransferStage;
use super::types::{TransferRequest, TransferResult};
use crate::core_types::{AccountId, Amount};
use crate::models::Account;
use crate::store::{
    AccountStore, EntryStore, StoreError, TRANSFER_TO_ACCOUNT_FK, TransferStore, TxManager,
};

/// Transfer Engine - executes transfer units against injected stores
pub struct TransferEngine<M: TxManager> {
    tx_manager: Arc<M>,
    accounts: Arc<dyn AccountStore<M::Tx>>,
    entries: Arc<dyn EntryStore<M::Tx>>,
    transfers: Arc<dyn TransferStore<M::Tx>>,
}

impl<M: TxManager> TransferEngine<M> {
    /// Create an engine from separate store capabilities sharing one
    /// transaction type
    pub fn new(
        tx_manager: Arc<M>,
        accounts: Arc<dyn AccountStore<M::Tx>>,
        entries: Arc<dyn EntryStore<M::Tx>>,
        transfers: Arc<dyn TransferStore<M::Tx>>,
    ) -> Self {
        Self {
            tx_manager,
            accounts,
            entries,
            transfers,
        }
    }

    /// Create an engine backed by one store implementing every capability
    pub fn from_store(store: Arc<M>) -> Self
    where
        M: AccountStore<M::Tx> + EntryStore<M::Tx> + TransferStore<M::Tx> + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store)
    }

    pub async fn execute(&self, req: &TransferRequest) -> Result<TransferResult, TransferError> {
        self.transfer(req.from_account_id, req.to_account_id, req.amount)
            .await
    }

    /// Move `amount` from `from` to `to`
    ///
    /// # Errors
    /// - `InvalidArgument`: `amount <= 0`, `from == to`, currency mismatch, overflow
    /// - `AccountNotFound`: either id does not resolve (nothing written)
    /// - `InsufficientFunds`: the debit would make the source negative
    /// - `TransientStoreFailure`: store/transaction failure, safe to retry
    /// - `StoreFailure`: deterministic store fault, not retryable
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<TransferResult, TransferError> {
        validate(from, to, amount)?;

        let mut tx = self.tx_manager.begin().await.map_err(|e| {
            warn!(from, to, amount, error = %e, "Failed to open transaction");
            TransferError::from(e)
        })?;

        let mut stage = TransferStage::Started;
        let outcome = self.run(&mut tx, from, to, amount, &mut stage).await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                if let Err(rb) = self.tx_manager.rollback(tx).await {
                    // The store discards the unit when the handle is dropped
                    error!(from, to, error = %rb, "Rollback failed");
                }
                warn!(
                    from,
                    to,
                    amount,
                    stage = %stage,
                    discarded_writes = stage.has_pending_writes(),
                    error = %e,
                    "Transfer rolled back"
                );
                return Err(e);
            }
        };

        if let Err(e) = self.tx_manager.commit(tx).await {
            warn!(from, to, amount, stage = %stage, error = %e, "Transfer commit failed");
            return Err(e.into());
        }
        stage = TransferStage::Committed;

        info!(
            transfer_id = result.transfer.id,
            from,
            to,
            amount,
            stage = %stage,
            "Transfer committed"
        );
        Ok(result)
    }

    async fn run(
        &self,
        tx: &mut M::Tx,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        stage: &mut TransferStage,
    ) -> Result<TransferResult, TransferError> {
        // Resolve both accounts before the first write
        let source = self.load(tx, from).await?;
        let destination = self.load(tx, to).await?;
        if source.currency != destination.currency {
            return Err(TransferError::invalid(format!(
                "currency mismatch: {} -> {}",
                source.currency, destination.currency
            )));
        }

        let transfer = self
            .transfers
            .create_transfer(tx, from, to, amount)
            .await
            .map_err(|e| match e {
                StoreError::ForeignKeyViolation(c) if c == TRANSFER_TO_ACCOUNT_FK => {
                    TransferError::AccountNotFound(to)
                }
                StoreError::ForeignKeyViolation(_) => TransferError::AccountNotFound(from),
                other => other.into(),
            })?;

        let from_entry = self
            .entries
            .create_entry(tx, from, -amount)
            .await
            .map_err(|e| missing_account(e, from))?;
        let to_entry = self
            .entries
            .create_entry(tx, to, amount)
            .await
            .map_err(|e| missing_account(e, to))?;

        *stage = TransferStage::EntriesWritten;
        debug!(transfer_id = transfer.id, stage = %stage, "Entries written");

        let [first, second] = lock_order(from, to, amount);
        let first_account = self.apply(tx, first).await?;
        let second_account = self.apply(tx, second).await?;

        let (from_account, to_account) = if first.account_id == from {
            (first_account, second_account)
        } else {
            (second_account, first_account)
        };

        *stage = TransferStage::BalancesUpdated;
        debug!(transfer_id = transfer.id, stage = %stage, "Balances updated");

        Ok(TransferResult {
            transfer,
            from_entry,
            to_entry,
            from_account,
            to_account,
        })
    }

    async fn load(&self, tx: &mut M::Tx, id: AccountId) -> Result<Account, TransferError> {
        self.accounts
            .get_account(tx, id)
            .await?
            .ok_or(TransferError::AccountNotFound(id))
    }

    /// Lock one row, add the delta, write it back
    async fn apply(&self, tx: &mut M::Tx, update: BalanceUpdate) -> Result<Account, TransferError> {
        let id = update.account_id;

        let locked = self
            .accounts
            .get_account_for_update(tx, id)
            .await?
            .ok_or(TransferError::AccountNotFound(id))?;

        let new_balance = locked.balance.checked_add(update.delta).ok_or_else(|| {
            TransferError::invalid(format!("balance overflow on account {id}"))
        })?;

        self.accounts
            .update_account_balance(tx, id, new_balance)
            .await
            .map_err(|e| {
                if let StoreError::NegativeBalance { .. } = e {
                    debug!(
                        account_id = id,
                        balance = locked.balance,
                        delta = update.delta,
                        "Debit rejected: insufficient funds"
                    );
                }
                e.into()
            })
    }
}

fn validate(from: AccountId, to: AccountId, amount: Amount) -> Result<(), TransferError> {
    if amount <= 0 {
        return Err(TransferError::invalid(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if from == to {
        return Err(TransferError::invalid(format!(
            "source and destination account are the same ({from})"
        )));
    }
    Ok(())
}

fn missing_account(e: StoreError, id: AccountId) -> TransferError {
    match e {
        StoreError::ForeignKeyViolation(_) => TransferError::AccountNotFound(id),
        other => other.into(),
    }
}
