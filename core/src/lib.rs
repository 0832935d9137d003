//! PaySim ledger scoring engine.
//!
//! Layers, leaves first:
//!   store: SQLite ledger (the only code that runs SQL)
//!   account_view: per-account aggregates built fresh from the ledger
//!   rules: ordered heuristics producing a `Verdict`
//!   query: read-only operations offered to callers
//!   rpc: JSON-RPC 2.0 mapping over `query`
//!
//! Ingestion (`loader`, `sample`) runs before any query and is the only
//! writer.

pub mod account_view;
pub mod config;
pub mod error;
pub mod loader;
pub mod query;
pub mod rpc;
pub mod rules;
pub mod sample;
pub mod store;
pub mod transaction;
pub mod types;
