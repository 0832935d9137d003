//! Account view builder: aggregates, windows, errors, idempotence.

mod common;

use common::{consistent, service_with, wipe_ledger};
use paysim_core::{
    account_view::ActivityWindow,
    error::LedgerError,
    transaction::TransactionType,
};

#[test]
fn origin_view_aggregates_outgoing_activity() {
    let service = service_with(&wipe_ledger());
    let v = service.get_account_kpi("C1").unwrap();

    assert_eq!(v.account_id, "C1");
    assert_eq!(v.outgoing_count, 4);
    assert_eq!(v.outgoing_total, 9_600.0);
    assert_eq!(v.incoming_count, 0);
    assert_eq!(v.incoming_total, 0.0);
    assert_eq!(v.balance_inconsistency_count, 0);
    assert_eq!(v.distinct_counterparties, 4);
    assert_eq!(v.activity_window, ActivityWindow { min_step: 1, max_step: 4 });
    assert_eq!(v.outgoing_by_type.get(&TransactionType::Payment), Some(&3));
    assert_eq!(v.outgoing_by_type.get(&TransactionType::Transfer), Some(&1));
    assert_eq!(v.average_outgoing(), 2_400.0);
    assert_eq!(v.average_incoming(), 0.0);
}

#[test]
fn destination_view_aggregates_incoming_activity() {
    let service = service_with(&wipe_ledger());
    let v = service.get_account_kpi("C2").unwrap();

    assert_eq!(v.incoming_count, 1);
    assert_eq!(v.incoming_total, 9_000.0);
    assert_eq!(v.outgoing_count, 0);
    assert_eq!(v.distinct_counterparties, 1);
    assert_eq!(v.activity_window, ActivityWindow { min_step: 4, max_step: 4 });
}

#[test]
fn counterparties_are_distinct_across_directions() {
    let rows = vec![
        consistent(1, TransactionType::Transfer, 10.0, "A", 100.0, "B", 0.0),
        consistent(2, TransactionType::Transfer, 5.0, "B", 10.0, "A", 90.0),
        consistent(3, TransactionType::Transfer, 1.0, "A", 95.0, "B", 5.0),
        consistent(4, TransactionType::Transfer, 1.0, "A", 94.0, "C", 0.0),
    ];
    let v = service_with(&rows).get_account_kpi("A").unwrap();
    assert_eq!(v.distinct_counterparties, 2);
    assert_eq!((v.outgoing_count, v.incoming_count), (3, 1));
}

#[test]
fn balance_inconsistencies_respect_tolerance() {
    let mut rounding = consistent(1, TransactionType::Payment, 100.0, "C7", 1_000.0, "M7", 0.0);
    rounding.newbalance_org = 900.4; // within one unit
    let mut broken = consistent(2, TransactionType::Payment, 100.0, "C7", 900.4, "M7", 100.0);
    broken.newbalance_org = 850.0;
    broken.newbalance_dest = 100.0; // destination not credited either

    let service = service_with(&[rounding, broken]);
    assert_eq!(service.get_account_kpi("C7").unwrap().balance_inconsistency_count, 1);
    assert_eq!(service.get_account_kpi("M7").unwrap().balance_inconsistency_count, 1);
}

#[test]
fn unknown_account_is_not_found() {
    let service = service_with(&wipe_ledger());
    let err = service.get_account_kpi("C_NOBODY").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }), "{err:?}");
    assert!(err.to_string().contains("C_NOBODY"));
}

#[test]
fn repeated_queries_return_identical_views() {
    let service = service_with(&wipe_ledger());
    for account in ["C1", "C2", "M1", "M2", "M3"] {
        let first = service.get_account_kpi(account).unwrap();
        let second = service.get_account_kpi(account).unwrap();
        assert_eq!(first, second, "{account}");
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn windowed_view_only_counts_steps_in_range() {
    let service = service_with(&wipe_ledger());
    let v = service.get_account_kpi_in_window("C1", 2, 3).unwrap();
    assert_eq!(v.outgoing_count, 2);
    assert_eq!(v.outgoing_total, 400.0);
    assert_eq!(v.activity_window, ActivityWindow { min_step: 2, max_step: 3 });

    let err = service.get_account_kpi_in_window("C1", 50, 60).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    let err = service.get_account_kpi_in_window("C1", 5, 1).unwrap_err();
    assert!(matches!(err, LedgerError::Validation { .. }));
}
