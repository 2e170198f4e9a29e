//! Synthetic fuel transaction dataset

use crate::feature_extractor::{ActivityCounts, FeatureExtractor, FeatureVector};
use crate::types::transaction::Transaction;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Kinds of fraud the generator plants in the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FraudKind {
    Undercharge,
    Overcharge,
    QuantityMismatch,
    RateManipulation,
}

impl FraudKind {
    const ALL: [FraudKind; 4] = [
        FraudKind::Undercharge,
        FraudKind::Overcharge,
        FraudKind::QuantityMismatch,
        FraudKind::RateManipulation,
    ];
}

/// One generated transaction with its ground truth
#[derive(Debug, Clone)]
pub struct LabeledTransaction {
    pub transaction: Transaction,
    pub is_fraud: bool,
    pub kind: Option<FraudKind>,
}

/// Seeded generator for normal and fraudulent transactions
pub struct DatasetGenerator {
    rng: StdRng,
}

impl DatasetGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `normal` legitimate and `fraud` fraudulent rows, shuffled into one
    /// stream
    pub fn generate(&mut self, normal: usize, fraud: usize) -> Vec<LabeledTransaction> {
        let mut rows = Vec::with_capacity(normal + fraud);
        rows.extend((0..normal).map(|_| self.generate_normal()));
        rows.extend((0..fraud).map(|_| self.generate_fraud()));
        rows.shuffle(&mut self.rng);
        rows
    }

    /// Operating hours, normal quantity and rate, amount within ±5%
    pub fn generate_normal(&mut self) -> LabeledTransaction {
        let qty = self.rng.gen_range(10.0..80.0);
        let rate = self.rng.gen_range(1.20..2.00);
        let amount = qty * rate * self.rng.gen_range(0.95..1.05);
        let hour = self.rng.gen_range(6..22);

        LabeledTransaction {
            transaction: self.build(qty, rate, amount, hour),
            is_fraud: false,
            kind: None,
        }
    }

    pub fn generate_fraud(&mut self) -> LabeledTransaction {
        let kind = FraudKind::ALL[self.rng.gen_range(0..FraudKind::ALL.len())];

        let (qty, rate, factor) = match kind {
            FraudKind::Undercharge => (
                self.rng.gen_range(20.0..80.0),
                self.rng.gen_range(1.20..2.00),
                self.rng.gen_range(0.5..0.8),
            ),
            FraudKind::Overcharge => (
                self.rng.gen_range(15.0..60.0),
                self.rng.gen_range(1.20..2.00),
                self.rng.gen_range(1.3..2.0),
            ),
            FraudKind::QuantityMismatch => {
                let qty = if self.rng.gen_bool(0.5) {
                    self.rng.gen_range(1.0..5.0)
                } else {
                    self.rng.gen_range(100.0..200.0)
                };
                (qty, self.rng.gen_range(1.20..2.00), self.rng.gen_range(0.8..1.2))
            }
            FraudKind::RateManipulation => {
                let rate = if self.rng.gen_bool(0.5) {
                    self.rng.gen_range(0.5..1.0)
                } else {
                    self.rng.gen_range(3.0..5.0)
                };
                (self.rng.gen_range(20.0..60.0), rate, self.rng.gen_range(0.9..1.1))
            }
        };

        // Late night, early morning, or normal hours
        let roll: f64 = self.rng.gen();
        let hour = if roll < 0.3 {
            self.rng.gen_range(22..24)
        } else if roll < 0.6 {
            self.rng.gen_range(0..6)
        } else {
            self.rng.gen_range(6..22)
        };

        LabeledTransaction {
            transaction: self.build(qty, rate, qty * rate * factor, hour),
            is_fraud: true,
            kind: Some(kind),
        }
    }

    fn build(&mut self, qty: f64, rate: f64, amount: f64, hour: u32) -> Transaction {
        let pump_id = self.rng.gen_range(1..21);
        let employee_id = self.rng.gen_range(100..301);
        let weekday = self.rng.gen_range(1..8);
        let minute = self.rng.gen_range(0..60);

        Transaction::new(qty, rate, round_cents(amount), pump_id, employee_id)
            .at(timestamp(weekday, hour, minute))
    }
}

/// A timestamp in the week of Monday 2024-01-01 (UTC)
fn timestamp(weekday: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    let monday = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
    monday
        + Duration::days(i64::from(weekday) - 1)
        + Duration::hours(i64::from(hour))
        + Duration::minutes(i64::from(minute))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Running per-id counts in dataset order, each including its own row.
///
/// Matches what [`MemoryLedger`](crate::store::MemoryLedger) hands the scorer
/// when the rows are ingested in the same order.
pub fn activity_counts(rows: &[LabeledTransaction]) -> Vec<ActivityCounts> {
    let mut employees: HashMap<u32, u64> = HashMap::new();
    let mut pumps: HashMap<u32, u64> = HashMap::new();

    rows.iter()
        .map(|row| {
            let employee = employees.entry(row.transaction.employee_id).or_default();
            *employee += 1;
            let pump = pumps.entry(row.transaction.pump_id).or_default();
            *pump += 1;
            ActivityCounts::new(*employee, *pump)
        })
        .collect()
}

/// Derive feature vectors for every row using the running counts.
pub fn derive_features(
    rows: &[LabeledTransaction],
    extractor: &FeatureExtractor,
) -> Vec<FeatureVector> {
    rows.iter()
        .zip(activity_counts(rows))
        .map(|(row, counts)| extractor.extract(&row.transaction, counts))
        .collect()
}
