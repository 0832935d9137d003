use super::{transaction_from_row, LedgerStore, TRANSACTION_COLUMNS};
use crate::{
    error::LedgerResult,
    transaction::{Transaction, TransactionType},
    types::{Step, TxId},
};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

/// Ledger-wide counts for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerOverview {
    pub transaction_count: u64,
    pub labelled_fraud_count: u64,
    pub fraud_rate: f64,
    pub step_min: Option<Step>,
    pub step_max: Option<Step>,
    /// Per-type counts, most frequent first.
    pub type_counts: Vec<(TransactionType, u64)>,
}

impl LedgerStore {
    // ── Lookups ───────────────────────────────────────────────────

    pub fn transaction_count(&self) -> LedgerResult<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn get_transaction(&self, id: TxId) -> LedgerResult<Option<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
        let found = self
            .conn
            .query_row(&sql, params![id], transaction_from_row)
            .optional()?;
        Ok(found)
    }

    /// Every transaction, in id order.
    pub fn all_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], transaction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Transactions where `account` is origin or destination, in id order.
    pub fn transactions_for_account(&self, account: &str) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE name_orig = ?1 OR name_dest = ?1
             ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![account], transaction_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Same as `transactions_for_account`, restricted to `step_from..=step_to`.
    pub fn transactions_for_account_in_window(
        &self,
        account: &str,
        step_from: Step,
        step_to: Step,
    ) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE (name_orig = ?1 OR name_dest = ?1) AND step BETWEEN ?2 AND ?3
             ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![account, step_from as i64, step_to as i64],
            transaction_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn account_exists(&self, account: &str) -> LedgerResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE name_orig = ?1 OR name_dest = ?1)",
            params![account],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Outgoing TRANSFER / CASH_OUT rows of `account` with `amount >= min_amount`,
    /// largest first.
    pub fn large_outflows(
        &self,
        account: &str,
        min_amount: f64,
        limit: usize,
    ) -> LedgerResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE name_orig = ?1 AND amount >= ?2 AND type IN ('TRANSFER', 'CASH_OUT')
             ORDER BY amount DESC, id ASC
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![account, min_amount, limit as i64],
            transaction_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Outgoing amounts of `account`, ascending.
    pub fn outgoing_amounts(&self, account: &str) -> LedgerResult<Vec<f64>> {
        let mut stmt = self.conn.prepare(
            "SELECT amount FROM transactions WHERE name_orig = ?1 ORDER BY amount ASC",
        )?;
        let rows = stmt.query_map(params![account], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct account names appearing on either side, ascending.
    pub fn distinct_accounts(&self, limit: usize) -> LedgerResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM (
                SELECT name_orig AS name FROM transactions
                UNION
                SELECT name_dest AS name FROM transactions
             ) ORDER BY name ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Overview ──────────────────────────────────────────────────

    pub fn overview(&self) -> LedgerResult<LedgerOverview> {
        let (count, fraud, step_min, step_max): (i64, i64, Option<i64>, Option<i64>) =
            self.conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN is_fraud = 1 THEN 1 ELSE 0 END), 0),
                        MIN(step), MAX(step)
                 FROM transactions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let mut stmt = self.conn.prepare(
            "SELECT type, COUNT(*) AS cnt FROM transactions
             GROUP BY type ORDER BY cnt DESC, type ASC",
        )?;
        let type_counts = stmt
            .query_map([], |row| {
                let raw: String = row.get(0)?;
                let cnt: i64 = row.get(1)?;
                Ok((raw, cnt))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(raw, cnt)| Ok((raw.parse::<TransactionType>()?, cnt as u64)))
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(LedgerOverview {
            transaction_count: count as u64,
            labelled_fraud_count: fraud as u64,
            fraud_rate: if count > 0 { fraud as f64 / count as f64 } else { 0.0 },
            step_min: step_min.map(|s| s as u64),
            step_max: step_max.map(|s| s as u64),
            type_counts,
        })
    }
}
