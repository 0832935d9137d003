//! Ledger ingestion: PaySim CSV exports and synthetic samples.
//!
//! Ingestion runs out of band, before any scoring query. A load is
//! all-or-nothing: every row is parsed and validated first, then inserted
//! in one SQLite transaction. A ledger that already holds rows is left
//! untouched.

use crate::{
    error::{LedgerError, LedgerResult},
    sample::generate_sample,
    store::LedgerStore,
    transaction::{NewTransaction, TransactionType},
};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Rows above this amount survive `reduce` regardless of type.
const REDUCE_AMOUNT_THRESHOLD: f64 = 100_000.0;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Stop after this many accepted rows.
    pub max_rows: Option<usize>,
    /// Keep only large, labelled-fraud, or TRANSFER / CASH_OUT rows.
    pub reduce: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_filtered: usize,
    pub rows_inserted: usize,
    /// True when the ledger was already populated and nothing was loaded.
    pub skipped_existing: bool,
}

/// One CSV record. Accepts both PaySim camelCase and snake_case headers.
#[derive(Debug, Deserialize)]
struct CsvRow {
    step: u64,
    #[serde(rename = "type")]
    txn_type: String,
    amount: f64,
    #[serde(alias = "nameOrig")]
    name_orig: String,
    #[serde(alias = "oldbalanceOrg")]
    oldbalance_org: f64,
    #[serde(alias = "newbalanceOrig")]
    newbalance_org: f64,
    #[serde(alias = "nameDest")]
    name_dest: String,
    #[serde(alias = "oldbalanceDest")]
    oldbalance_dest: f64,
    #[serde(alias = "newbalanceDest")]
    newbalance_dest: f64,
    #[serde(alias = "isFraud")]
    is_fraud: Option<String>,
    #[serde(alias = "isFlaggedFraud")]
    is_flagged_fraud: Option<String>,
}

fn parse_flag(raw: &str, field: &str, line: u64) -> LedgerResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" | "y" => Ok(true),
        "0" | "0.0" | "false" | "f" | "no" | "n" => Ok(false),
        other => Err(LedgerError::validation(
            format!("line {line}: {field}"),
            format!("not a boolean: '{other}'"),
        )),
    }
}

impl CsvRow {
    fn into_new_transaction(self, line: u64) -> LedgerResult<NewTransaction> {
        let with_line = |e: LedgerError| match e {
            LedgerError::Validation { field, reason } => {
                LedgerError::validation(format!("line {line}: {field}"), reason)
            }
            other => other,
        };
        let txn_type: TransactionType = self.txn_type.parse().map_err(with_line)?;
        let is_fraud = match self.is_fraud.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(parse_flag(raw, "is_fraud", line)?),
            _ => None,
        };
        let is_flagged_fraud = match self.is_flagged_fraud.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_flag(raw, "is_flagged_fraud", line)?,
            _ => false,
        };
        let row = NewTransaction {
            step: self.step,
            txn_type,
            amount: self.amount,
            name_orig: self.name_orig,
            oldbalance_org: self.oldbalance_org,
            newbalance_org: self.newbalance_org,
            name_dest: self.name_dest,
            oldbalance_dest: self.oldbalance_dest,
            newbalance_dest: self.newbalance_dest,
            is_fraud,
            is_flagged_fraud,
        };
        row.validate().map_err(with_line)?;
        Ok(row)
    }
}

fn keep_when_reduced(row: &NewTransaction) -> bool {
    row.amount > REDUCE_AMOUNT_THRESHOLD || row.is_fraud == Some(true) || row.txn_type.is_outflow()
}

/// Parse and validate every record of `reader` without touching a store.
pub fn read_csv<R: Read>(reader: R, opts: &LoadOptions) -> LedgerResult<(Vec<NewTransaction>, usize, usize)> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    let mut read = 0usize;
    let mut filtered = 0usize;
    for record in rdr.deserialize::<CsvRow>() {
        if opts.max_rows.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let record = record?;
        read += 1;
        // Header is line 1.
        let row = record.into_new_transaction(read as u64 + 1)?;
        if opts.reduce && !keep_when_reduced(&row) {
            filtered += 1;
            continue;
        }
        rows.push(row);
    }
    Ok((rows, read, filtered))
}

pub fn load_csv<R: Read>(store: &LedgerStore, reader: R, opts: &LoadOptions) -> LedgerResult<LoadReport> {
    let existing = store.transaction_count()?;
    if existing > 0 {
        log::info!("loader: ledger already has {existing} rows, skipping load");
        return Ok(LoadReport {
            rows_read: 0,
            rows_filtered: 0,
            rows_inserted: 0,
            skipped_existing: true,
        });
    }
    let (rows, read, filtered) = read_csv(reader, opts)?;
    let ids = store.insert_batch(&rows)?;
    log::info!(
        "loader: read {read} rows, filtered {filtered}, inserted {}",
        ids.len()
    );
    Ok(LoadReport {
        rows_read: read,
        rows_filtered: filtered,
        rows_inserted: ids.len(),
        skipped_existing: false,
    })
}

pub fn load_csv_path(store: &LedgerStore, path: &str, opts: &LoadOptions) -> LedgerResult<LoadReport> {
    log::info!("loader: reading {path}");
    let file = std::fs::File::open(path).map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    load_csv(store, file, opts)
}

/// Fill an empty ledger with a deterministic synthetic sample.
pub fn load_sample(store: &LedgerStore, seed: u64, rows: usize) -> LedgerResult<LoadReport> {
    let existing = store.transaction_count()?;
    if existing > 0 {
        log::info!("loader: ledger already has {existing} rows, skipping synthetic sample");
        return Ok(LoadReport {
            rows_read: 0,
            rows_filtered: 0,
            rows_inserted: 0,
            skipped_existing: true,
        });
    }
    let sample = generate_sample(seed, rows);
    let ids = store.insert_batch(&sample)?;
    log::info!("loader: inserted {} synthetic rows (seed={seed})", ids.len());
    Ok(LoadReport {
        rows_read: sample.len(),
        rows_filtered: 0,
        rows_inserted: ids.len(),
        skipped_existing: false,
    })
}
