//! Deterministic synthetic PaySim-like ledgers.
//!
//! RULE: Nothing here calls a platform RNG. The same `(seed, rows)` always
//! produces the same rows, which is what the determinism tests and the
//! `--synthetic` server flag rely on.
//!
//! Embedded fraud signatures (labelled `is_fraud = true`):
//!   - account takeover: TRANSFER of the whole balance to a fresh account,
//!     immediately followed by a CASH_OUT of the same amount;
//!   - mule funnel: many customers TRANSFER into one account that never
//!     sends anything onward.
//! Legitimate noise includes payment bursts and the occasional row whose
//! balances do not add up.

use crate::{
    transaction::{NewTransaction, TransactionType},
    types::Step,
};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

const CUSTOMERS: u64 = 400;
const MERCHANTS: u64 = 60;
const STEPS: u64 = 240;
const TAKEOVER_RATE: f64 = 0.02;
const MULE_FEED_RATE: f64 = 0.03;
const BURST_RATE: f64 = 0.02;
const GLITCH_RATE: f64 = 0.01;

/// A seeded PCG stream.
pub struct SampleRng {
    inner: Pcg64Mcg,
}

impl SampleRng {
    pub fn new(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Simplified Pareto draw; x_min is the floor, alpha the shape.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }
}

fn customer(i: u64) -> String {
    format!("C{:09}", 100_000_000 + i)
}

fn merchant(i: u64) -> String {
    format!("M{:09}", 500_000_000 + i)
}

fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

struct Generator {
    rng: SampleRng,
    balances: Vec<f64>,
    rows: Vec<NewTransaction>,
    fresh_accounts: u64,
    mule: String,
}

impl Generator {
    fn new(seed: u64) -> Self {
        let mut rng = SampleRng::new(seed);
        let balances = (0..CUSTOMERS)
            .map(|_| round_cents(rng.pareto(500.0, 1.3).min(2_000_000.0)))
            .collect();
        Self {
            rng,
            balances,
            rows: Vec::new(),
            fresh_accounts: 0,
            mule: customer(CUSTOMERS + 9_000),
        }
    }

    fn push(
        &mut self,
        step: Step,
        txn_type: TransactionType,
        amount: f64,
        orig: (String, f64, f64),
        dest: (String, f64, f64),
        is_fraud: bool,
    ) {
        self.rows.push(NewTransaction {
            step,
            txn_type,
            amount,
            name_orig: orig.0,
            oldbalance_org: orig.1,
            newbalance_org: orig.2,
            name_dest: dest.0,
            oldbalance_dest: dest.1,
            newbalance_dest: dest.2,
            is_fraud: Some(is_fraud),
            // PaySim's own rule: transfers above 200 000.
            is_flagged_fraud: txn_type == TransactionType::Transfer && amount > 200_000.0,
        });
    }

    /// Debit customer `c` by `amount`, returning (old, new).
    fn debit(&mut self, c: u64, amount: f64) -> (f64, f64) {
        let old = self.balances[c as usize];
        let new = round_cents((old - amount).max(0.0));
        self.balances[c as usize] = new;
        (old, new)
    }

    fn payment(&mut self, step: Step, c: u64) {
        let old = self.balances[c as usize];
        let amount = round_cents(self.rng.pareto(5.0, 1.5).min(old.max(1.0)));
        let (old, new) = self.debit(c, amount);
        let m = merchant(self.rng.next_u64_below(MERCHANTS));
        self.push(
            step,
            TransactionType::Payment,
            amount,
            (customer(c), old, new),
            (m, 0.0, amount),
            false,
        );
    }

    fn cash_in(&mut self, step: Step, c: u64) {
        let amount = round_cents(self.rng.pareto(50.0, 1.4).min(50_000.0));
        let old = self.balances[c as usize];
        let new = round_cents(old + amount);
        self.balances[c as usize] = new;
        let agent = merchant(self.rng.next_u64_below(MERCHANTS));
        let float = round_cents(amount * 10.0);
        self.push(
            step,
            TransactionType::CashIn,
            amount,
            (agent, float, round_cents(float - amount)),
            (customer(c), old, new),
            false,
        );
    }

    fn takeover(&mut self, step: Step, victim: u64) {
        let amount = self.balances[victim as usize];
        if amount <= 0.0 {
            return self.payment(step, victim);
        }
        let (old, _) = self.debit(victim, amount);
        self.fresh_accounts += 1;
        let fresh = customer(CUSTOMERS + self.fresh_accounts);
        self.push(
            step,
            TransactionType::Transfer,
            amount,
            (customer(victim), old, 0.0),
            (fresh.clone(), 0.0, amount),
            true,
        );
        let m = merchant(self.rng.next_u64_below(MERCHANTS));
        self.push(
            step,
            TransactionType::CashOut,
            amount,
            (fresh, amount, 0.0),
            (m, 0.0, amount),
            true,
        );
    }

    fn mule_feed(&mut self, step: Step, c: u64) {
        let old = self.balances[c as usize];
        let amount = round_cents((old * 0.3).max(1.0).min(old.max(1.0)));
        let (old, new) = self.debit(c, amount);
        let mule_balance = self
            .rows
            .iter()
            .rev()
            .find(|r| r.name_dest == self.mule)
            .map(|r| r.newbalance_dest)
            .unwrap_or(0.0);
        let mule = self.mule.clone();
        self.push(
            step,
            TransactionType::Transfer,
            amount,
            (customer(c), old, new),
            (mule, mule_balance, round_cents(mule_balance + amount)),
            true,
        );
    }

    fn burst(&mut self, step: Step, c: u64) {
        for _ in 0..6 {
            self.payment(step, c);
        }
    }

    fn glitch(&mut self, step: Step, c: u64) {
        self.payment(step, c);
        if let Some(last) = self.rows.last_mut() {
            last.newbalance_org = round_cents(last.newbalance_org + 25.0);
        }
    }
}

/// Generate `rows` synthetic ledger rows from `seed`.
pub fn generate_sample(seed: u64, rows: usize) -> Vec<NewTransaction> {
    let mut g = Generator::new(seed);
    let mut i: u64 = 0;
    while g.rows.len() < rows {
        let step = 1 + (i * STEPS) / (rows as u64).max(1);
        let c = g.rng.next_u64_below(CUSTOMERS);
        let roll = g.rng.next_f64();
        if roll < TAKEOVER_RATE {
            g.takeover(step, c);
        } else if roll < TAKEOVER_RATE + MULE_FEED_RATE {
            g.mule_feed(step, c);
        } else if roll < TAKEOVER_RATE + MULE_FEED_RATE + BURST_RATE {
            g.burst(step, c);
        } else if roll < TAKEOVER_RATE + MULE_FEED_RATE + BURST_RATE + GLITCH_RATE {
            g.glitch(step, c);
        } else if g.rng.chance(0.25) {
            g.cash_in(step, c);
        } else {
            g.payment(step, c);
        }
        i += 1;
    }
    g.rows.truncate(rows);
    g.rows
}
