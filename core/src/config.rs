//! Rule thresholds and weights.
//!
//! A `RuleConfig` is built once (defaults, JSON file, `key=value`
//! overrides), validated, and then handed to `RuleEngine::new` by value.
//! Nothing reads thresholds from ambient state.

use crate::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};

/// Weight each rule adds to the verdict score when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleWeights {
    pub high_amount: f64,
    pub balance_wipe: f64,
    pub inconsistent_balance: f64,
    pub rapid_transfer: f64,
    pub destination_mule: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            high_amount: 0.35,
            balance_wipe: 0.35,
            inconsistent_balance: 0.15,
            rapid_transfer: 0.20,
            destination_mule: 0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    /// Amount above which any transaction is high-amount.
    pub amount_abs_threshold: f64,
    /// Multiple of the origin's historical average outgoing amount.
    pub amount_multiple_threshold: f64,
    /// Outgoing transactions per step of the origin's activity window.
    pub frequency_threshold: f64,
    /// Distinct counterparties a destination must exceed to look like a mule.
    pub mule_fanin_threshold: u64,
    /// Score at or above which a verdict is flagged.
    pub decision_threshold: f64,
    /// Absolute slack allowed in balance arithmetic.
    pub balance_tolerance: f64,
    /// Outgoing / incoming count ratio at or below which a destination
    /// counts as forwarding little.
    pub mule_max_outgoing_ratio: f64,
    pub weights: RuleWeights,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            amount_abs_threshold: 5_000.0,
            amount_multiple_threshold: 5.0,
            frequency_threshold: 3.0,
            mule_fanin_threshold: 20,
            decision_threshold: 0.5,
            balance_tolerance: 1.0,
            mule_max_outgoing_ratio: 0.1,
            weights: RuleWeights::default(),
        }
    }
}

impl RuleConfig {
    /// Load from a JSON file. Keys not present keep their defaults.
    pub fn load(path: &str) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> LedgerResult<Self> {
        let config: RuleConfig = serde_json::from_str(content)
            .map_err(|e| LedgerError::validation("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set one option from a `key=value` string, e.g.
    /// `decision_threshold=0.7` or `weights.balance_wipe=0.5`.
    pub fn apply_override(&mut self, assignment: &str) -> LedgerResult<()> {
        let (key, raw) = assignment.split_once('=').ok_or_else(|| {
            LedgerError::validation(assignment, "expected key=value")
        })?;
        let key = key.trim();
        let raw = raw.trim();
        let mut next = self.clone();

        if key == "mule_fanin_threshold" {
            next.mule_fanin_threshold = raw.parse().map_err(|_| {
                LedgerError::validation(key, format!("not a non-negative integer: '{raw}'"))
            })?;
            next.validate()?;
            *self = next;
            return Ok(());
        }

        let value: f64 = raw
            .parse()
            .map_err(|_| LedgerError::validation(key, format!("not a number: '{raw}'")))?;
        let slot = match key {
            "amount_abs_threshold" => &mut next.amount_abs_threshold,
            "amount_multiple_threshold" => &mut next.amount_multiple_threshold,
            "frequency_threshold" => &mut next.frequency_threshold,
            "decision_threshold" => &mut next.decision_threshold,
            "balance_tolerance" => &mut next.balance_tolerance,
            "mule_max_outgoing_ratio" => &mut next.mule_max_outgoing_ratio,
            "weights.high_amount" => &mut next.weights.high_amount,
            "weights.balance_wipe" => &mut next.weights.balance_wipe,
            "weights.inconsistent_balance" => &mut next.weights.inconsistent_balance,
            "weights.rapid_transfer" => &mut next.weights.rapid_transfer,
            "weights.destination_mule" => &mut next.weights.destination_mule,
            _ => return Err(LedgerError::validation(key, "unknown configuration option")),
        };
        *slot = value;
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let non_negative = [
            ("amount_abs_threshold", self.amount_abs_threshold),
            ("amount_multiple_threshold", self.amount_multiple_threshold),
            ("frequency_threshold", self.frequency_threshold),
            ("balance_tolerance", self.balance_tolerance),
            ("mule_max_outgoing_ratio", self.mule_max_outgoing_ratio),
            ("weights.high_amount", self.weights.high_amount),
            ("weights.balance_wipe", self.weights.balance_wipe),
            ("weights.inconsistent_balance", self.weights.inconsistent_balance),
            ("weights.rapid_transfer", self.weights.rapid_transfer),
            ("weights.destination_mule", self.weights.destination_mule),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::validation(
                    field,
                    format!("must be a finite non-negative number, got {value}"),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(LedgerError::validation(
                "decision_threshold",
                format!("must be within [0, 1], got {}", self.decision_threshold),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RuleConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = RuleConfig::from_json(r#"{ "decision_threshold": 0.7, "weights": { "balance_wipe": 0.5 } }"#)
            .unwrap();
        assert_eq!(cfg.decision_threshold, 0.7);
        assert_eq!(cfg.weights.balance_wipe, 0.5);
        assert_eq!(cfg.weights.high_amount, RuleWeights::default().high_amount);
        assert_eq!(cfg.amount_abs_threshold, 5_000.0);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = RuleConfig::from_json(r#"{ "decision_treshold": 0.7 }"#).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
    }

    #[test]
    fn non_numeric_threshold_is_rejected() {
        let err = RuleConfig::from_json(r#"{ "frequency_threshold": "fast" }"#).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));

        let mut cfg = RuleConfig::default();
        assert!(cfg.apply_override("frequency_threshold=fast").is_err());
        assert!(cfg.apply_override("mule_fanin_threshold=-3").is_err());
    }

    #[test]
    fn overrides_apply_and_validate() {
        let mut cfg = RuleConfig::default();
        cfg.apply_override("decision_threshold=0.8").unwrap();
        cfg.apply_override("mule_fanin_threshold = 40").unwrap();
        cfg.apply_override("weights.rapid_transfer=0.1").unwrap();
        assert_eq!(cfg.decision_threshold, 0.8);
        assert_eq!(cfg.mule_fanin_threshold, 40);
        assert_eq!(cfg.weights.rapid_transfer, 0.1);

        assert!(cfg.apply_override("decision_threshold=1.5").is_err());
        assert_eq!(cfg.decision_threshold, 0.8, "rejected override must not stick");
        assert!(cfg.apply_override("balance_tolerance=-1").is_err());
        assert!(cfg.apply_override("no_such_option=1").is_err());
        assert!(cfg.apply_override("decision_threshold").is_err());
    }
}
