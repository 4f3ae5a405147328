//! Core types used throughout the ledger
//!
//! Fundamental type aliases shared by the entity model, the stores and the
//! transfer engine. They map 1:1 onto PostgreSQL `BIGINT` / `BIGSERIAL`.

/// Account ID - unique, assigned by the store on creation.
///
/// # Lock order:
/// Account rows are always locked in ascending `AccountId` order, so the
/// numeric ordering of this type is part of the deadlock-freedom contract.
pub type AccountId = i64;

/// Entry ID - unique within the ledger
pub type EntryId = i64;

/// Transfer ID - unique within the ledger
pub type TransferId = i64;

/// Money amount in the smallest currency unit (e.g. cents).
///
/// Signed: entries carry negative amounts for debits.
pub type Amount = i64;
