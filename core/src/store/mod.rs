//! SQLite ledger store.
//!
//! RULE: Only the store talks to the database.
//! The view builder, rule engine and query service call store methods.
//! They never execute SQL directly.

use crate::{
    error::{LedgerError, LedgerResult},
    transaction::{Transaction, TransactionType},
};
use rusqlite::{types::Type, Connection, Row};

mod ledger;
mod queries;

pub use queries::LedgerOverview;

/// Columns selected by every transaction query, in `transaction_from_row` order.
pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, step, type, amount, name_orig, oldbalance_org, newbalance_org,
     name_dest, oldbalance_dest, newbalance_dest, is_fraud, is_flagged_fraud";

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for a private :memory: database
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open a private in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn, path: None })
    }

    /// Open a new connection to the same database.
    /// For a private in-memory database this returns a new, empty one;
    /// use a `file:…?mode=memory&cache=shared` URI to share memory.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    /// Run `f` against a single read snapshot of the ledger.
    ///
    /// Every query issued inside `f` sees the same committed state, so
    /// multi-query operations stay self-consistent while an out-of-band
    /// loader writes through another connection. Must not be nested.
    pub fn read_snapshot<T>(
        &self,
        f: impl FnOnce(&Self) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }
}

pub(crate) fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let raw_type: String = row.get(2)?;
    let txn_type: TransactionType = raw_type.parse().map_err(|e: LedgerError| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
    })?;
    Ok(Transaction {
        id: row.get(0)?,
        step: row.get::<_, i64>(1)? as u64,
        txn_type,
        amount: row.get(3)?,
        name_orig: row.get(4)?,
        oldbalance_org: row.get(5)?,
        newbalance_org: row.get(6)?,
        name_dest: row.get(7)?,
        oldbalance_dest: row.get(8)?,
        newbalance_dest: row.get(9)?,
        is_fraud: row.get(10)?,
        is_flagged_fraud: row.get(11)?,
    })
}
