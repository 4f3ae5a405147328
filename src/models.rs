//! Ledger entity model
//!
//! Accounts hold balances, transfers record money movements, and entries
//! record the signed debit/credit halves of each transfer. Entries and
//! transfers are immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core_types::{AccountId, Amount, EntryId, TransferId};

/// Balance-holding account
///
/// Invariant: `balance >= 0`, enforced by the store on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    /// Balance in the smallest currency unit
    pub balance: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for opening a new account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub balance: Amount,
    pub currency: String,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, balance: Amount, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency: currency.into(),
        }
    }
}

/// Append-only ledger line for one account
///
/// Negative amounts are debits, positive amounts are credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    #[inline]
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}

/// Money movement between two accounts
///
/// `amount` is strictly positive; direction is given by the account ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Whether `account_id` is either side of this transfer
    pub fn touches(&self, account_id: AccountId) -> bool {
        self.from_account_id == account_id || self.to_account_id == account_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_direction() {
        let debit = Entry {
            id: 1,
            account_id: 7,
            amount: -30,
            created_at: Utc::now(),
        };
        let credit = Entry {
            amount: 30,
            ..debit.clone()
        };

        assert!(debit.is_debit());
        assert!(!credit.is_debit());
    }

    #[test]
    fn test_transfer_touches() {
        let transfer = Transfer {
            id: 1,
            from_account_id: 1,
            to_account_id: 2,
            amount: 30,
            created_at: Utc::now(),
        };

        assert!(transfer.touches(1));
        assert!(transfer.touches(2));
        assert!(!transfer.touches(3));
    }

    #[test]
    fn test_account_json_shape() {
        let account = Account {
            id: 1,
            owner: "alice".to_string(),
            balance: 100,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["balance"], 100);
        assert_eq!(json["currency"], "USD");
    }
}
