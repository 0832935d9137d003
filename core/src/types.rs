//! Shared primitive types used across the ledger and the engine.

/// A simulated time unit. One PaySim step = one hour.
pub type Step = u64;

/// Row id assigned by the ledger store at ingestion.
pub type TxId = i64;

/// A PaySim account name (`C…` for customers, `M…` for merchants).
pub type AccountId = String;

/// Largest step the store can represent (steps are stored as SQLite INTEGER).
pub const MAX_STEP: Step = i64::MAX as Step;
