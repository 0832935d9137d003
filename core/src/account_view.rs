//! Account View Builder.
//!
//! An `AccountView` is a pure function of the ledger rows it was built from.
//! Views are never cached and never updated in place: every request scans
//! the store again and returns a fresh value.
//!
//! The per-account builder (`build_view`) and the ledger-wide builder
//! (`build_all_views`) share one accumulator, so a view looks the same no
//! matter which path produced it.

use crate::{
    error::{LedgerError, LedgerResult},
    store::LedgerStore,
    transaction::{Transaction, TransactionType},
    types::{AccountId, Step, MAX_STEP},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// First and last step in which the account was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityWindow {
    pub min_step: Step,
    pub max_step: Step,
}

impl ActivityWindow {
    /// Number of steps covered, inclusive on both ends.
    pub fn span(&self) -> u64 {
        self.max_step - self.min_step + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    pub account_id: AccountId,
    pub outgoing_count: u64,
    pub outgoing_total: f64,
    pub incoming_count: u64,
    pub incoming_total: f64,
    pub balance_inconsistency_count: u64,
    pub distinct_counterparties: u64,
    pub activity_window: ActivityWindow,
    pub outgoing_by_type: BTreeMap<TransactionType, u64>,
    /// Outgoing rows labelled `is_fraud` in the source data.
    /// Reporting only: no rule reads it.
    pub fraud_outgoing_count: u64,
}

impl AccountView {
    pub fn average_outgoing(&self) -> f64 {
        if self.outgoing_count == 0 {
            0.0
        } else {
            self.outgoing_total / self.outgoing_count as f64
        }
    }

    pub fn average_incoming(&self) -> f64 {
        if self.incoming_count == 0 {
            0.0
        } else {
            self.incoming_total / self.incoming_count as f64
        }
    }
}

/// Origin-side balance check: `|old − amount − new| > ε`.
pub fn origin_inconsistent(t: &Transaction, tolerance: f64) -> bool {
    (t.oldbalance_org - t.amount - t.newbalance_org).abs() > tolerance
}

/// Destination-side balance check: `|old + amount − new| > ε`.
pub fn destination_inconsistent(t: &Transaction, tolerance: f64) -> bool {
    (t.oldbalance_dest + t.amount - t.newbalance_dest).abs() > tolerance
}

#[derive(Debug)]
struct ViewAccumulator {
    outgoing_count: u64,
    outgoing_total: f64,
    incoming_count: u64,
    incoming_total: f64,
    inconsistencies: u64,
    counterparties: BTreeSet<String>,
    min_step: Step,
    max_step: Step,
    outgoing_by_type: BTreeMap<TransactionType, u64>,
    fraud_outgoing: u64,
}

impl ViewAccumulator {
    fn new(step: Step) -> Self {
        Self {
            outgoing_count: 0,
            outgoing_total: 0.0,
            incoming_count: 0,
            incoming_total: 0.0,
            inconsistencies: 0,
            counterparties: BTreeSet::new(),
            min_step: step,
            max_step: step,
            outgoing_by_type: BTreeMap::new(),
            fraud_outgoing: 0,
        }
    }

    fn touch(&mut self, step: Step) {
        self.min_step = self.min_step.min(step);
        self.max_step = self.max_step.max(step);
    }

    fn add_outgoing(&mut self, t: &Transaction, tolerance: f64) {
        self.touch(t.step);
        self.outgoing_count += 1;
        self.outgoing_total += t.amount;
        *self.outgoing_by_type.entry(t.txn_type).or_insert(0) += 1;
        if t.is_fraud == Some(true) {
            self.fraud_outgoing += 1;
        }
        if origin_inconsistent(t, tolerance) {
            self.inconsistencies += 1;
        }
        self.counterparties.insert(t.name_dest.clone());
    }

    fn add_incoming(&mut self, t: &Transaction, tolerance: f64) {
        self.touch(t.step);
        self.incoming_count += 1;
        self.incoming_total += t.amount;
        if destination_inconsistent(t, tolerance) {
            self.inconsistencies += 1;
        }
        self.counterparties.insert(t.name_orig.clone());
    }

    fn finish(self, account_id: AccountId) -> AccountView {
        AccountView {
            account_id,
            outgoing_count: self.outgoing_count,
            outgoing_total: self.outgoing_total,
            incoming_count: self.incoming_count,
            incoming_total: self.incoming_total,
            balance_inconsistency_count: self.inconsistencies,
            distinct_counterparties: self.counterparties.len() as u64,
            activity_window: ActivityWindow {
                min_step: self.min_step,
                max_step: self.max_step,
            },
            outgoing_by_type: self.outgoing_by_type,
            fraud_outgoing_count: self.fraud_outgoing,
        }
    }
}

/// Aggregate the view of `account_id` from `rows`.
/// Rows not touching the account are ignored. Returns `None` when no row
/// touches it.
pub fn aggregate_view(
    account_id: &str,
    rows: &[Transaction],
    tolerance: f64,
) -> Option<AccountView> {
    let mut acc: Option<ViewAccumulator> = None;
    for t in rows {
        // A self-transfer counts on both sides.
        if t.name_orig == account_id {
            acc.get_or_insert_with(|| ViewAccumulator::new(t.step))
                .add_outgoing(t, tolerance);
        }
        if t.name_dest == account_id {
            acc.get_or_insert_with(|| ViewAccumulator::new(t.step))
                .add_incoming(t, tolerance);
        }
    }
    acc.map(|a| a.finish(account_id.to_string()))
}

/// Views for every account appearing in `rows`, in one pass.
pub fn build_all_views(rows: &[Transaction], tolerance: f64) -> HashMap<AccountId, AccountView> {
    let mut accs: HashMap<AccountId, ViewAccumulator> = HashMap::new();
    for t in rows {
        accs.entry(t.name_orig.clone())
            .or_insert_with(|| ViewAccumulator::new(t.step))
            .add_outgoing(t, tolerance);
        accs.entry(t.name_dest.clone())
            .or_insert_with(|| ViewAccumulator::new(t.step))
            .add_incoming(t, tolerance);
    }
    accs.into_iter()
        .map(|(id, acc)| {
            let view = acc.finish(id.clone());
            (id, view)
        })
        .collect()
}

/// Builds views straight from the store.
pub struct AccountViewBuilder<'a> {
    store: &'a LedgerStore,
    tolerance: f64,
}

impl<'a> AccountViewBuilder<'a> {
    pub fn new(store: &'a LedgerStore, tolerance: f64) -> Self {
        Self { store, tolerance }
    }

    pub fn build_view(&self, account_id: &str) -> LedgerResult<AccountView> {
        let rows = self.store.transactions_for_account(account_id)?;
        aggregate_view(account_id, &rows, self.tolerance)
            .ok_or_else(|| LedgerError::not_found("account", account_id))
    }

    /// View restricted to `step_from..=step_to`.
    ///
    /// An account that exists but is idle in the window yields `NotFound`
    /// too: there is no activity window to report.
    pub fn build_view_in_window(
        &self,
        account_id: &str,
        step_from: Step,
        step_to: Step,
    ) -> LedgerResult<AccountView> {
        if step_from > step_to {
            return Err(LedgerError::validation(
                "step_from",
                format!("step_from ({step_from}) is after step_to ({step_to})"),
            ));
        }
        if step_to > MAX_STEP {
            return Err(LedgerError::validation(
                "step_to",
                format!("must not exceed {MAX_STEP}, got {step_to}"),
            ));
        }
        let rows = self
            .store
            .transactions_for_account_in_window(account_id, step_from, step_to)?;
        aggregate_view(account_id, &rows, self.tolerance).ok_or_else(|| {
            LedgerError::not_found(
                "account activity",
                format!("{account_id} in steps {step_from}..={step_to}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: i64, step: Step, orig: &str, dest: &str, amount: f64) -> Transaction {
        Transaction {
            id,
            step,
            txn_type: TransactionType::Transfer,
            amount,
            name_orig: orig.into(),
            oldbalance_org: 1_000.0,
            newbalance_org: 1_000.0 - amount,
            name_dest: dest.into(),
            oldbalance_dest: 0.0,
            newbalance_dest: amount,
            is_fraud: None,
            is_flagged_fraud: false,
        }
    }

    #[test]
    fn both_builders_agree() {
        let rows = vec![
            tx(1, 3, "A", "B", 100.0),
            tx(2, 5, "B", "C", 40.0),
            tx(3, 9, "C", "A", 10.0),
            tx(4, 2, "A", "A", 5.0),
        ];
        let all = build_all_views(&rows, 1.0);
        for id in ["A", "B", "C"] {
            assert_eq!(all.get(id), aggregate_view(id, &rows, 1.0).as_ref(), "{id}");
        }
    }

    #[test]
    fn self_transfer_counts_both_sides() {
        let rows = vec![tx(1, 4, "A", "A", 5.0)];
        let v = aggregate_view("A", &rows, 1.0).unwrap();
        assert_eq!((v.outgoing_count, v.incoming_count), (1, 1));
        assert_eq!(v.distinct_counterparties, 1);
    }

    #[test]
    fn tolerance_absorbs_rounding() {
        let mut t = tx(1, 1, "A", "B", 100.0);
        t.newbalance_org = 900.6;
        assert!(!origin_inconsistent(&t, 1.0));
        t.newbalance_org = 898.0;
        assert!(origin_inconsistent(&t, 1.0));
        t.newbalance_dest = 101.5;
        assert!(destination_inconsistent(&t, 1.0));
    }

    #[test]
    fn unknown_account_has_no_view() {
        let rows = vec![tx(1, 1, "A", "B", 1.0)];
        assert!(aggregate_view("Z", &rows, 1.0).is_none());
    }
}
