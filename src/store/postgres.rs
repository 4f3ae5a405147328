//! PostgreSQL ledger store
//!
//! sqlx-based implementation of all store capabilities. Row locks use
//! `SELECT ... FOR NO KEY UPDATE`, which blocks concurrent balance writers but
//! not inserts of entries/transfers referencing the account through foreign keys.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::{AccountStore, BALANCE_NONNEGATIVE, EntryStore, TransferStore, TxManager};
use crate::core_types::{AccountId, Amount, EntryId, TransferId};
use crate::models::{Account, Entry, NewAccount, Transfer};

/// PostgreSQL-backed store for accounts, entries and transfers
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgLedgerStore {
    /// Create a store using the server's default `lock_timeout`
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Bound every row-lock wait inside a transaction
    ///
    /// A wait exceeding `timeout` fails with [`StoreError::LockTimeout`].
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TxManager for PgLedgerStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            // SET does not accept bind parameters
            let stmt = format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis());
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }

        Ok(tx)
    }

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()> {
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore<Transaction<'static, Postgres>> for PgLedgerStore {
    async fn create_account(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account: &NewAccount,
    ) -> StoreResult<Account> {
        let created = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&account.owner)
        .bind(account.balance)
        .bind(&account.currency)
        .fetch_one(&mut **tx)
        .await?;

        debug!(account_id = created.id, owner = %created.owner, "Account created");
        Ok(created)
    }

    async fn get_account(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: AccountId,
    ) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(account)
    }

    async fn get_account_for_update(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: AccountId,
    ) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts WHERE id = $1
            FOR NO KEY UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(account)
    }

    async fn update_account_balance(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: AccountId,
        new_balance: Amount,
    ) -> StoreResult<Account> {
        let updated = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts SET balance = $1
            WHERE id = $2
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(new_balance)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::CheckViolation(c) if c == BALANCE_NONNEGATIVE => {
                StoreError::NegativeBalance {
                    account_id: id,
                    balance: new_balance,
                }
            }
            other => other,
        })?;

        updated.ok_or(StoreError::AccountNotFound(id))
    }
}

#[async_trait]
impl EntryStore<Transaction<'static, Postgres>> for PgLedgerStore {
    async fn create_entry(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Entry> {
        let entry = sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;

        Ok(entry)
    }

    async fn get_entry(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: EntryId,
    ) -> StoreResult<Option<Entry>> {
        let entry = sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(entry)
    }

    async fn list_entries(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: AccountId,
    ) -> StoreResult<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries WHERE account_id = $1
            ORDER BY id
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(entries)
    }
}

#[async_trait]
impl TransferStore<Transaction<'static, Postgres>> for PgLedgerStore {
    async fn create_transfer(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> StoreResult<Transfer> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;

        Ok(transfer)
    }

    async fn get_transfer(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: TransferId,
    ) -> StoreResult<Option<Transfer>> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(transfer)
    }

    async fn list_transfers(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: AccountId,
    ) -> StoreResult<Vec<Transfer>> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers WHERE from_account_id = $1 OR to_account_id = $1
            ORDER BY id
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(transfers)
    }
}
