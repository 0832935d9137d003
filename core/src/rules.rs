//! Rule engine: fixed, ordered fraud heuristics.
//!
//! EVALUATION ORDER (fixed, never reordered; defines `Verdict::reasons`):
//!   1. High amount
//!   2. Balance wipe
//!   3. Inconsistent balance
//!   4. Rapid transfer
//!   5. Destination mule
//!
//! RULES:
//!   - Each fired rule adds its weight; the sum is clamped to 1.0.
//!   - The engine reads the transaction and the two views only.
//!   - Ground truth (`is_fraud`) is never consulted.

use crate::{
    account_view::AccountView,
    config::RuleConfig,
    error::LedgerResult,
    transaction::Transaction,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    HighAmount,
    BalanceWipe,
    InconsistentBalance,
    RapidTransfer,
    DestinationMule,
}

impl RuleKind {
    /// Stable code used as the prefix of every reason string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::HighAmount => "high-amount",
            Self::BalanceWipe => "balance-wipe",
            Self::InconsistentBalance => "inconsistent-balance",
            Self::RapidTransfer => "rapid-transfer",
            Self::DestinationMule => "destination-mule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub score: f64,
    pub flagged: bool,
    pub reasons: Vec<String>,
    pub triggered: Vec<RuleKind>,
}

impl Verdict {
    pub fn fired(&self, rule: RuleKind) -> bool {
        self.triggered.contains(&rule)
    }
}

pub struct RuleEngine {
    config: RuleConfig,
}

impl RuleEngine {
    /// Validates `config` once; the engine never changes it afterwards.
    pub fn new(config: RuleConfig) -> LedgerResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Score `t` against the views of its origin and destination.
    ///
    /// The views must come from the ledger holding `t`: the high-amount
    /// baseline removes `t` itself from the origin's outgoing history.
    pub fn score(&self, t: &Transaction, orig: &AccountView, dest: &AccountView) -> Verdict {
        let w = &self.config.weights;
        let mut fired: Vec<(RuleKind, f64, String)> = Vec::new();

        if let Some(why) = self.high_amount(t, orig) {
            fired.push((RuleKind::HighAmount, w.high_amount, why));
        }
        if let Some(why) = self.balance_wipe(t) {
            fired.push((RuleKind::BalanceWipe, w.balance_wipe, why));
        }
        if let Some(why) = self.inconsistent_balance(orig, dest) {
            fired.push((RuleKind::InconsistentBalance, w.inconsistent_balance, why));
        }
        if let Some(why) = self.rapid_transfer(orig) {
            fired.push((RuleKind::RapidTransfer, w.rapid_transfer, why));
        }
        if let Some(why) = self.destination_mule(dest) {
            fired.push((RuleKind::DestinationMule, w.destination_mule, why));
        }

        let score = fired.iter().map(|(_, weight, _)| weight).sum::<f64>().min(1.0);
        Verdict {
            score,
            flagged: score >= self.config.decision_threshold,
            reasons: fired
                .iter()
                .map(|(rule, _, why)| format!("{}: {why}", rule.code()))
                .collect(),
            triggered: fired.into_iter().map(|(rule, _, _)| rule).collect(),
        }
    }

    fn high_amount(&self, t: &Transaction, orig: &AccountView) -> Option<String> {
        if t.amount > self.config.amount_abs_threshold {
            return Some(format!(
                "amount {:.2} exceeds absolute threshold {:.2}",
                t.amount, self.config.amount_abs_threshold
            ));
        }
        // Baseline = the origin's other outgoing transactions.
        let prior_count = orig.outgoing_count.saturating_sub(1);
        if prior_count == 0 {
            return None;
        }
        let baseline = (orig.outgoing_total - t.amount) / prior_count as f64;
        let limit = baseline * self.config.amount_multiple_threshold;
        (baseline > 0.0 && t.amount > limit).then(|| {
            format!(
                "amount {:.2} exceeds {}x the origin's average outgoing amount {:.2}",
                t.amount, self.config.amount_multiple_threshold, baseline
            )
        })
    }

    fn balance_wipe(&self, t: &Transaction) -> Option<String> {
        let wiped = t.txn_type.is_outflow() && t.oldbalance_org > 0.0 && t.newbalance_org == 0.0;
        wiped.then(|| {
            format!(
                "{} empties origin balance of {:.2}",
                t.txn_type, t.oldbalance_org
            )
        })
    }

    fn inconsistent_balance(&self, orig: &AccountView, dest: &AccountView) -> Option<String> {
        let parts: Vec<String> = [orig, dest]
            .iter()
            .filter(|v| v.balance_inconsistency_count > 0)
            .map(|v| {
                format!(
                    "{} has {} inconsistent balance update(s)",
                    v.account_id, v.balance_inconsistency_count
                )
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }

    fn rapid_transfer(&self, orig: &AccountView) -> Option<String> {
        if orig.outgoing_count < 2 {
            return None;
        }
        let span = orig.activity_window.span();
        let rate = orig.outgoing_count as f64 / span as f64;
        (rate > self.config.frequency_threshold).then(|| {
            format!(
                "{} sent {} transactions over {} step(s) ({:.2} per step, threshold {})",
                orig.account_id,
                orig.outgoing_count,
                span,
                rate,
                self.config.frequency_threshold
            )
        })
    }

    fn destination_mule(&self, dest: &AccountView) -> Option<String> {
        let fan_in = dest.distinct_counterparties > self.config.mule_fanin_threshold;
        let forwards_little = dest.outgoing_count as f64
            <= dest.incoming_count as f64 * self.config.mule_max_outgoing_ratio;
        (fan_in && forwards_little).then(|| {
            format!(
                "{} deals with {} distinct counterparties but sent only {} of {} transactions onward",
                dest.account_id,
                dest.distinct_counterparties,
                dest.outgoing_count,
                dest.incoming_count + dest.outgoing_count
            )
        })
    }
}
