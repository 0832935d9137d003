//! Ledger builders shared by the integration tests.

#![allow(dead_code)]

use paysim_core::{
    config::RuleConfig,
    query::QueryService,
    store::LedgerStore,
    transaction::{NewTransaction, TransactionType},
};

/// A row whose balances add up on both sides.
pub fn consistent(
    step: u64,
    txn_type: TransactionType,
    amount: f64,
    orig: &str,
    orig_old: f64,
    dest: &str,
    dest_old: f64,
) -> NewTransaction {
    NewTransaction {
        step,
        txn_type,
        amount,
        name_orig: orig.into(),
        oldbalance_org: orig_old,
        newbalance_org: orig_old - amount,
        name_dest: dest.into(),
        oldbalance_dest: dest_old,
        newbalance_dest: dest_old + amount,
        is_fraud: None,
        is_flagged_fraud: false,
    }
}

pub fn store_with(rows: &[NewTransaction]) -> LedgerStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = LedgerStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store.insert_batch(rows).expect("insert rows");
    store
}

pub fn service_with(rows: &[NewTransaction]) -> QueryService {
    QueryService::new(store_with(rows), RuleConfig::default()).expect("query service")
}

/// C1 pays three merchants 200 each, then transfers its remaining 9000 to C2.
/// The transfer is id 4.
pub fn wipe_ledger() -> Vec<NewTransaction> {
    vec![
        consistent(1, TransactionType::Payment, 200.0, "C1", 9_600.0, "M1", 0.0),
        consistent(2, TransactionType::Payment, 200.0, "C1", 9_400.0, "M2", 0.0),
        consistent(3, TransactionType::Payment, 200.0, "C1", 9_200.0, "M3", 0.0),
        consistent(4, TransactionType::Transfer, 9_000.0, "C1", 9_000.0, "C2", 0.0),
    ]
}

/// Fifty distinct customers each send `amount(i)` to `mule`, which never
/// sends anything onward.
pub fn mule_ledger(mule: &str, amount: impl Fn(usize) -> f64) -> Vec<NewTransaction> {
    let mut balance = 0.0;
    (0..50)
        .map(|i| {
            let a = amount(i);
            let row = consistent(
                10 + i as u64,
                TransactionType::Transfer,
                a,
                &format!("C{}", 1_000 + i),
                a * 10.0,
                mule,
                balance,
            );
            balance += a;
            row
        })
        .collect()
}
