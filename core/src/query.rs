//! Query interface: the read-only operations offered to callers.
//!
//! Every operation is idempotent and performs no writes. Operations that
//! need more than one store query run inside `LedgerStore::read_snapshot`,
//! so they see one consistent ledger state. Failures propagate whole:
//! no operation returns partial results.

use crate::{
    account_view::{build_all_views, AccountView, AccountViewBuilder},
    config::RuleConfig,
    error::{LedgerError, LedgerResult},
    rules::{RuleEngine, Verdict},
    store::{LedgerOverview, LedgerStore},
    transaction::Transaction,
    types::{Step, TxId},
};
use serde::Serialize;

pub const DEFAULT_SUSPICIOUS_MIN_AMOUNT: f64 = 200_000.0;
pub const DEFAULT_SUSPICIOUS_MAX_ROWS: usize = 10;
const SUGGESTION_FLOOR: f64 = 50_000.0;

/// A scored transaction in a candidate listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudCandidate {
    pub transaction: Transaction,
    pub verdict: Verdict,
}

/// Flags compared against ground-truth labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub labelled: u64,
    pub unlabelled: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
    pub precision: f64,
    pub recall: f64,
}

/// Proposed `detect_suspicious` parameters for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSuggestion {
    pub outgoing_count: u64,
    pub average_amount: f64,
    pub max_amount: f64,
    pub p95_amount: f64,
    pub min_amount: f64,
}

pub struct QueryService {
    store: LedgerStore,
    engine: RuleEngine,
}

impl QueryService {
    pub fn new(store: LedgerStore, config: RuleConfig) -> LedgerResult<Self> {
        Ok(Self {
            store,
            engine: RuleEngine::new(config)?,
        })
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn views(&self) -> AccountViewBuilder<'_> {
        AccountViewBuilder::new(&self.store, self.engine.config().balance_tolerance)
    }

    // ── Core operations ───────────────────────────────────────────

    pub fn get_transaction(&self, id: TxId) -> LedgerResult<Transaction> {
        self.store
            .get_transaction(id)?
            .ok_or_else(|| LedgerError::not_found("transaction", id))
    }

    pub fn get_account_kpi(&self, account_id: &str) -> LedgerResult<AccountView> {
        self.views().build_view(account_id)
    }

    pub fn get_account_kpi_in_window(
        &self,
        account_id: &str,
        step_from: Step,
        step_to: Step,
    ) -> LedgerResult<AccountView> {
        self.views().build_view_in_window(account_id, step_from, step_to)
    }

    /// Score the whole ledger and return the `limit` highest-scoring
    /// transactions with `score >= min_score`.
    ///
    /// Order: score descending, then id ascending.
    pub fn list_fraud_candidates(
        &self,
        min_score: f64,
        limit: usize,
    ) -> LedgerResult<Vec<FraudCandidate>> {
        if !min_score.is_finite() || !(0.0..=1.0).contains(&min_score) {
            return Err(LedgerError::validation(
                "min_score",
                format!("must be within [0, 1], got {min_score}"),
            ));
        }
        if limit == 0 {
            return Err(LedgerError::validation("limit", "must be at least 1"));
        }

        let mut candidates = self.score_ledger()?;
        let scanned = candidates.len();
        candidates.retain(|c| c.verdict.score >= min_score);
        candidates.sort_by(|a, b| {
            b.verdict
                .score
                .total_cmp(&a.verdict.score)
                .then(a.transaction.id.cmp(&b.transaction.id))
        });
        candidates.truncate(limit);
        log::debug!(
            "query: scanned {scanned} transactions, returning {} candidates (min_score={min_score}, limit={limit})",
            candidates.len()
        );
        Ok(candidates)
    }

    // ── Supplementary operations ──────────────────────────────────

    /// Score one stored transaction.
    pub fn score_transaction(&self, id: TxId) -> LedgerResult<FraudCandidate> {
        self.store.read_snapshot(|store| {
            let transaction = store
                .get_transaction(id)?
                .ok_or_else(|| LedgerError::not_found("transaction", id))?;
            let views = AccountViewBuilder::new(store, self.engine.config().balance_tolerance);
            let orig = views.build_view(&transaction.name_orig)?;
            let dest = views.build_view(&transaction.name_dest)?;
            let verdict = self.engine.score(&transaction, &orig, &dest);
            Ok(FraudCandidate { transaction, verdict })
        })
    }

    /// Large outgoing TRANSFER / CASH_OUT rows of one account, largest first.
    pub fn detect_suspicious(
        &self,
        account_id: &str,
        min_amount: f64,
        max_rows: usize,
    ) -> LedgerResult<Vec<Transaction>> {
        if !min_amount.is_finite() || min_amount < 0.0 {
            return Err(LedgerError::validation(
                "min_amount",
                format!("must be a non-negative number, got {min_amount}"),
            ));
        }
        if max_rows == 0 {
            return Err(LedgerError::validation("max_rows", "must be at least 1"));
        }
        self.store.read_snapshot(|store| {
            if !store.account_exists(account_id)? {
                return Err(LedgerError::not_found("account", account_id));
            }
            store.large_outflows(account_id, min_amount, max_rows)
        })
    }

    /// Propose a `min_amount` for `detect_suspicious` from the account's
    /// outgoing distribution: max(p95, 2 × average, 50 000), capped at the
    /// largest outgoing amount and rounded down to a thousand.
    pub fn suggest_detection_params(&self, account_id: &str) -> LedgerResult<DetectionSuggestion> {
        let amounts = self.store.read_snapshot(|store| {
            if !store.account_exists(account_id)? {
                return Err(LedgerError::not_found("account", account_id));
            }
            store.outgoing_amounts(account_id)
        })?;

        let count = amounts.len();
        let average = if count > 0 { amounts.iter().sum::<f64>() / count as f64 } else { 0.0 };
        let max = amounts.last().copied().unwrap_or(0.0);
        let p95 = percentile(&amounts, 0.95);

        let mut base = p95.max(average * 2.0).max(SUGGESTION_FLOOR);
        if max > 0.0 {
            base = base.min(max);
        }
        let mut min_amount = (base / 1000.0).floor() * 1000.0;
        if min_amount <= 0.0 {
            min_amount = SUGGESTION_FLOOR;
        }

        Ok(DetectionSuggestion {
            outgoing_count: count as u64,
            average_amount: average,
            max_amount: max,
            p95_amount: p95,
            min_amount,
        })
    }

    pub fn ledger_overview(&self) -> LedgerResult<LedgerOverview> {
        self.store.read_snapshot(|store| store.overview())
    }

    pub fn list_accounts(&self, limit: usize) -> LedgerResult<Vec<String>> {
        if limit == 0 {
            return Err(LedgerError::validation("limit", "must be at least 1"));
        }
        self.store.distinct_accounts(limit)
    }

    /// Compare `flagged` with `is_fraud` over every labelled transaction.
    /// The only operation that reads ground truth, and only after scoring.
    pub fn evaluate(&self) -> LedgerResult<Evaluation> {
        let scored = self.score_ledger()?;
        let mut eval = Evaluation {
            labelled: 0,
            unlabelled: 0,
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
            precision: 0.0,
            recall: 0.0,
        };
        for c in &scored {
            match (c.transaction.is_fraud, c.verdict.flagged) {
                (None, _) => eval.unlabelled += 1,
                (Some(true), true) => eval.true_positives += 1,
                (Some(false), true) => eval.false_positives += 1,
                (Some(false), false) => eval.true_negatives += 1,
                (Some(true), false) => eval.false_negatives += 1,
            }
        }
        eval.labelled = scored.len() as u64 - eval.unlabelled;
        let flagged = eval.true_positives + eval.false_positives;
        let actual = eval.true_positives + eval.false_negatives;
        if flagged > 0 {
            eval.precision = eval.true_positives as f64 / flagged as f64;
        }
        if actual > 0 {
            eval.recall = eval.true_positives as f64 / actual as f64;
        }
        log::info!(
            "evaluate: {} labelled, precision={:.3} recall={:.3}",
            eval.labelled,
            eval.precision,
            eval.recall
        );
        Ok(eval)
    }

    /// Score every transaction, in id order, against one snapshot.
    fn score_ledger(&self) -> LedgerResult<Vec<FraudCandidate>> {
        let rows = self.store.read_snapshot(|store| store.all_transactions())?;
        let views = build_all_views(&rows, self.engine.config().balance_tolerance);
        rows.into_iter()
            .map(|t| {
                let orig = views
                    .get(&t.name_orig)
                    .ok_or_else(|| LedgerError::not_found("account", &t.name_orig))?;
                let dest = views
                    .get(&t.name_dest)
                    .ok_or_else(|| LedgerError::not_found("account", &t.name_dest))?;
                let verdict = self.engine.score(&t, orig, dest);
                Ok(FraudCandidate { transaction: t, verdict })
            })
            .collect()
    }
}

/// Linear-interpolated percentile of ascending `sorted`, `q` in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
