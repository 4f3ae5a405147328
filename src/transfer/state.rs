//! Transfer Unit Stages
//!
//! Progress of one transfer unit. Nothing persists between calls: every
//! `transfer()` starts at `Started`, and any failure before `Committed` rolls
//! the unit back to nothing.

use std::fmt;

/// Stage reached by a transfer unit
///
/// ```text
/// STARTED → ENTRIES_WRITTEN → BALANCES_UPDATED → COMMITTED
///    ↓             ↓                  ↓
///    └─────────────┴──── rollback ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TransferStage {
    /// Transaction open, accounts validated, nothing written yet
    Started = 0,

    /// Transfer record and both entries written
    EntriesWritten = 1,

    /// Both balances updated under row locks
    BalancesUpdated = 2,

    /// Terminal: unit is durable
    Committed = 3,
}

impl TransferStage {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStage::Committed)
    }

    /// Whether a failure at this stage has writes to roll back
    #[inline]
    pub fn has_pending_writes(&self) -> bool {
        matches!(
            self,
            TransferStage::EntriesWritten | TransferStage::BalancesUpdated
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Started => "STARTED",
            TransferStage::EntriesWritten => "ENTRIES_WRITTEN",
            TransferStage::BalancesUpdated => "BALANCES_UPDATED",
            TransferStage::Committed => "COMMITTED",
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
