use super::LedgerStore;
use crate::{error::LedgerResult, transaction::NewTransaction, types::TxId};
use rusqlite::params;

impl LedgerStore {
    // ── Ingestion ─────────────────────────────────────────────────
    //
    // Only the loader and the sample generator write. The scoring path
    // never calls these.

    pub fn insert_transaction(&self, t: &NewTransaction) -> LedgerResult<TxId> {
        t.validate()?;
        self.conn.execute(
            "INSERT INTO transactions (
                step, type, amount, name_orig, oldbalance_org, newbalance_org,
                name_dest, oldbalance_dest, newbalance_dest, is_fraud, is_flagged_fraud
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                t.step as i64,
                t.txn_type.as_str(),
                t.amount,
                &t.name_orig,
                t.oldbalance_org,
                t.newbalance_org,
                &t.name_dest,
                t.oldbalance_dest,
                t.newbalance_dest,
                t.is_fraud,
                t.is_flagged_fraud,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert `rows` atomically: either every row lands or none does.
    /// Ids are assigned in input order.
    pub fn insert_batch(&self, rows: &[NewTransaction]) -> LedgerResult<Vec<TxId>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(self.insert_transaction(row)?);
        }
        tx.commit()?;
        log::debug!("ledger: inserted {} transactions", ids.len());
        Ok(ids)
    }
}
