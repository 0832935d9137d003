//! Rule engine scenarios against small hand-built ledgers.

mod common;

use common::{consistent, mule_ledger, service_with, wipe_ledger};
use paysim_core::{
    error::LedgerError,
    rules::RuleKind,
    transaction::TransactionType,
};

/// A transfer that empties the origin and dwarfs its history fires both
/// high-amount and balance-wipe, in that order, and is flagged.
#[test]
fn balance_wipe_with_high_amount_is_flagged() {
    let service = service_with(&wipe_ledger());
    let scored = service.score_transaction(4).unwrap();

    assert_eq!(scored.transaction.amount, 9_000.0);
    assert!(scored.verdict.fired(RuleKind::HighAmount), "{:?}", scored.verdict);
    assert!(scored.verdict.fired(RuleKind::BalanceWipe), "{:?}", scored.verdict);
    assert!(scored.verdict.flagged);
    assert!((scored.verdict.score - 0.70).abs() < 1e-9, "score {}", scored.verdict.score);

    let reasons = &scored.verdict.reasons;
    assert_eq!(reasons.len(), 2, "{reasons:?}");
    assert!(reasons[0].starts_with("high-amount"), "{reasons:?}");
    assert!(reasons[1].starts_with("balance-wipe"), "{reasons:?}");
}

/// An account's first and only transfer moving its whole balance is flagged
/// on its own, without any earlier history.
#[test]
fn lone_transfer_emptying_the_origin_is_flagged() {
    let service = service_with(&[consistent(
        1,
        TransactionType::Transfer,
        9_000.0,
        "C1",
        9_000.0,
        "C2",
        0.0,
    )]);
    let v = service.score_transaction(1).unwrap().verdict;

    assert_eq!(v.triggered, vec![RuleKind::HighAmount, RuleKind::BalanceWipe]);
    assert!(v.flagged, "{v:?}");
    assert!((v.score - 0.70).abs() < 1e-9, "score {}", v.score);
    assert!(v.reasons[0].starts_with("high-amount"), "{:?}", v.reasons);
    assert!(v.reasons[1].starts_with("balance-wipe"), "{:?}", v.reasons);
}

/// A small, consistent payment from a quiet account scores zero.
#[test]
fn small_consistent_payment_scores_zero() {
    let service = service_with(&[consistent(
        1,
        TransactionType::Payment,
        10.0,
        "C3",
        500.0,
        "M4",
        0.0,
    )]);
    let scored = service.score_transaction(1).unwrap();

    assert_eq!(scored.verdict.score, 0.0);
    assert!(!scored.verdict.flagged);
    assert!(scored.verdict.reasons.is_empty());
    assert!(scored.verdict.triggered.is_empty());
}

#[test]
fn unknown_transaction_is_not_found() {
    let service = service_with(&wipe_ledger());
    let err = service.get_transaction(999_999).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }), "{err:?}");
    assert!(err.to_string().contains("999999"));

    assert!(matches!(
        service.score_transaction(999_999),
        Err(LedgerError::NotFound { .. })
    ));
}

/// Fan-in from fifty senders with no onward transfers fires the mule rule
/// on every feeding transaction, whatever its size.
#[test]
fn funnel_account_fires_destination_mule() {
    let service = service_with(&mule_ledger("C_MULE", |i| 1.0 + i as f64 * 37.5));

    let kpi = service.get_account_kpi("C_MULE").unwrap();
    assert_eq!(kpi.distinct_counterparties, 50);
    assert_eq!(kpi.outgoing_count, 0);

    for id in 1..=50 {
        let scored = service.score_transaction(id).unwrap();
        assert!(
            scored.verdict.fired(RuleKind::DestinationMule),
            "tx {id}: {:?}",
            scored.verdict
        );
        assert!(!scored.verdict.fired(RuleKind::HighAmount), "tx {id}");
    }
}

/// A destination that forwards most of what it receives is not a mule.
#[test]
fn forwarding_destination_is_not_a_mule() {
    let mut rows = mule_ledger("C_HUB", |_| 100.0);
    for i in 0..40 {
        rows.push(consistent(
            100 + i,
            TransactionType::Payment,
            10.0,
            "C_HUB",
            5_000.0 - i as f64 * 10.0,
            &format!("M{i}"),
            0.0,
        ));
    }
    let service = service_with(&rows);
    let scored = service.score_transaction(1).unwrap();
    assert!(!scored.verdict.fired(RuleKind::DestinationMule), "{:?}", scored.verdict);
}

/// Inconsistent balances on either side fire the rule once, naming both accounts.
#[test]
fn inconsistent_balances_are_reported() {
    let mut row = consistent(1, TransactionType::CashOut, 100.0, "C5", 1_000.0, "M5", 0.0);
    row.newbalance_org = 1_000.0; // origin never debited
    row.newbalance_dest = 0.0; // destination never credited
    let service = service_with(&[row]);

    let v = service.score_transaction(1).unwrap().verdict;
    assert_eq!(v.triggered, vec![RuleKind::InconsistentBalance]);
    assert!(v.reasons[0].contains("C5") && v.reasons[0].contains("M5"), "{:?}", v.reasons);
    assert!(!v.flagged);
}

/// Many outgoing transfers in one step fire rapid-transfer.
#[test]
fn burst_of_transfers_fires_rapid_transfer() {
    let rows: Vec<_> = (0..8)
        .map(|i| {
            consistent(
                7,
                TransactionType::Transfer,
                50.0,
                "C6",
                1_000.0 - i as f64 * 50.0,
                &format!("C{}", 700 + i),
                0.0,
            )
        })
        .collect();
    let service = service_with(&rows);
    let v = service.score_transaction(8).unwrap().verdict;
    assert!(v.fired(RuleKind::RapidTransfer), "{v:?}");
    assert!(v.reasons.iter().any(|r| r.starts_with("rapid-transfer")));
}

/// Ground-truth labels never change a verdict.
#[test]
fn labels_do_not_leak_into_scores() {
    let mut labelled = wipe_ledger();
    for (i, row) in labelled.iter_mut().enumerate() {
        row.is_fraud = Some(i % 2 == 0);
        row.is_flagged_fraud = true;
    }
    let plain = service_with(&wipe_ledger());
    let tagged = service_with(&labelled);
    for id in 1..=4 {
        assert_eq!(
            plain.score_transaction(id).unwrap().verdict,
            tagged.score_transaction(id).unwrap().verdict,
            "tx {id}"
        );
    }
}
