//! Deadlock-free lock ordering
//!
//! Two transfers A→B and B→A running at once would deadlock if each locked
//! its source row first. Rows are instead always locked in ascending account
//! id, so every unit touching the same pair requests locks in the same order
//! and no circular wait can form.

use crate::core_types::{AccountId, Amount};

/// One balance mutation: lock `account_id`, then add `delta`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    pub delta: Amount,
}

/// Balance updates for a transfer, in lock-acquisition order
///
/// The source is debited `-amount` and the destination credited `+amount`;
/// the lower account id always comes first.
pub fn lock_order(from: AccountId, to: AccountId, amount: Amount) -> [BalanceUpdate; 2] {
    let debit = BalanceUpdate {
        account_id: from,
        delta: -amount,
    };
    let credit = BalanceUpdate {
        account_id: to,
        delta: amount,
    };

    if from < to {
        [debit, credit]
    } else {
        [credit, debit]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_source_locks_first() {
        let [first, second] = lock_order(1, 2, 30);
        assert_eq!(first, BalanceUpdate { account_id: 1, delta: -30 });
        assert_eq!(second, BalanceUpdate { account_id: 2, delta: 30 });
    }

    #[test]
    fn test_lower_destination_locks_first() {
        let [first, second] = lock_order(9, 4, 15);
        assert_eq!(first, BalanceUpdate { account_id: 4, delta: 15 });
        assert_eq!(second, BalanceUpdate { account_id: 9, delta: -15 });
    }

    #[test]
    fn test_reversed_pairs_share_order() {
        let forward = lock_order(3, 7, 10);
        let backward = lock_order(7, 3, 10);

        let ids = |u: [BalanceUpdate; 2]| [u[0].account_id, u[1].account_id];
        assert_eq!(ids(forward), ids(backward));
        assert_eq!(ids(forward), [3, 7]);
    }

    #[test]
    fn test_deltas_sum_to_zero() {
        for (from, to) in [(1, 2), (2, 1), (100, 5)] {
            let [a, b] = lock_order(from, to, 42);
            assert_eq!(a.delta + b.delta, 0);
        }
    }
}
