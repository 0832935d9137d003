//! Ledger records.
//!
//! A `Transaction` is immutable once stored. `NewTransaction` is the
//! ingestion shape: everything but the id, which the store assigns.

use crate::{
    error::{LedgerError, LedgerResult},
    types::{Step, TxId},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The closed set of PaySim transaction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Transfer,
    Payment,
    CashOut,
    CashIn,
    Debit,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        Self::Transfer,
        Self::Payment,
        Self::CashOut,
        Self::CashIn,
        Self::Debit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "TRANSFER",
            Self::Payment => "PAYMENT",
            Self::CashOut => "CASH_OUT",
            Self::CashIn => "CASH_IN",
            Self::Debit => "DEBIT",
        }
    }

    /// Types that move money out of the origin to a third party.
    pub fn is_outflow(&self) -> bool {
        matches!(self, Self::Transfer | Self::CashOut)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    /// Accepts `CASH_OUT`, `cash-out`, `Cash_Out`, etc.
    fn from_str(s: &str) -> LedgerResult<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "TRANSFER" => Ok(Self::Transfer),
            "PAYMENT" => Ok(Self::Payment),
            "CASH_OUT" => Ok(Self::CashOut),
            "CASH_IN" => Ok(Self::CashIn),
            "DEBIT" => Ok(Self::Debit),
            _ => Err(LedgerError::validation(
                "type",
                format!("unknown transaction type '{s}'"),
            )),
        }
    }
}

/// A stored ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub step: Step,
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    pub amount: f64,
    pub name_orig: String,
    pub oldbalance_org: f64,
    pub newbalance_org: f64,
    pub name_dest: String,
    pub oldbalance_dest: f64,
    pub newbalance_dest: f64,
    pub is_fraud: Option<bool>,
    pub is_flagged_fraud: bool,
}

/// A row awaiting ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub step: Step,
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    pub amount: f64,
    pub name_orig: String,
    pub oldbalance_org: f64,
    pub newbalance_org: f64,
    pub name_dest: String,
    pub oldbalance_dest: f64,
    pub newbalance_dest: f64,
    pub is_fraud: Option<bool>,
    pub is_flagged_fraud: bool,
}

impl NewTransaction {
    /// Reject rows that cannot be stored. Never coerces.
    pub fn validate(&self) -> LedgerResult<()> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(LedgerError::validation(
                "amount",
                format!("must be a non-negative number, got {}", self.amount),
            ));
        }
        for (field, value) in [
            ("oldbalance_org", self.oldbalance_org),
            ("newbalance_org", self.newbalance_org),
            ("oldbalance_dest", self.oldbalance_dest),
            ("newbalance_dest", self.newbalance_dest),
        ] {
            if !value.is_finite() {
                return Err(LedgerError::validation(field, format!("not a number: {value}")));
            }
        }
        if self.name_orig.trim().is_empty() {
            return Err(LedgerError::validation("name_orig", "must not be empty"));
        }
        if self.name_dest.trim().is_empty() {
            return Err(LedgerError::validation("name_dest", "must not be empty"));
        }
        Ok(())
    }

    pub fn with_id(self, id: TxId) -> Transaction {
        Transaction {
            id,
            step: self.step,
            txn_type: self.txn_type,
            amount: self.amount,
            name_orig: self.name_orig,
            oldbalance_org: self.oldbalance_org,
            newbalance_org: self.newbalance_org,
            name_dest: self.name_dest,
            oldbalance_dest: self.oldbalance_dest,
            newbalance_dest: self.newbalance_dest,
            is_fraud: self.is_fraud,
            is_flagged_fraud: self.is_flagged_fraud,
        }
    }
}
