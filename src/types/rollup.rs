//! Ledger records and per-pump rollups

use crate::types::alert::RiskLevel;
use crate::types::decision::{Decision, StrategyKind};
use crate::types::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scored transaction as persisted by the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Ledger id, assigned from 1 upwards
    pub id: u64,
    pub transaction: Transaction,
    pub is_fraud: bool,
    /// Confidence reported by the scorer
    pub fraud_score: f64,
    pub risk_level: RiskLevel,
    pub strategy: StrategyKind,
    pub explanation: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(id: u64, transaction: Transaction, decision: &Decision) -> Self {
        Self {
            id,
            transaction,
            is_fraud: decision.is_fraud,
            fraud_score: decision.confidence,
            risk_level: decision.risk_level,
            strategy: decision.strategy,
            explanation: decision.explanation.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregate statistics for one pump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpRollup {
    pub pump_id: u32,
    pub total_transactions: u64,
    pub fraud_count: u64,
    pub fraud_percentage: f64,
    pub total_fuel_dispensed: f64,
    pub total_revenue: f64,
    pub last_updated: DateTime<Utc>,
}

impl PumpRollup {
    /// Recompute the rollup from every record belonging to `pump_id`.
    pub fn recompute<'a, I>(pump_id: u32, records: I) -> Self
    where
        I: IntoIterator<Item = &'a TransactionRecord>,
    {
        let mut total_transactions = 0u64;
        let mut fraud_count = 0u64;
        let mut total_fuel_dispensed = 0.0;
        let mut total_revenue = 0.0;

        for record in records
            .into_iter()
            .filter(|r| r.transaction.pump_id == pump_id)
        {
            total_transactions += 1;
            if record.is_fraud {
                fraud_count += 1;
            }
            total_fuel_dispensed += record.transaction.fuel_quantity;
            total_revenue += record.transaction.total_amount;
        }

        Self {
            pump_id,
            total_transactions,
            fraud_count,
            fraud_percentage: fraud_percentage(fraud_count, total_transactions),
            total_fuel_dispensed,
            total_revenue,
            last_updated: Utc::now(),
        }
    }
}

/// `fraud_count / total * 100`, or 0 with no transactions.
pub fn fraud_percentage(fraud_count: u64, total_transactions: u64) -> f64 {
    if total_transactions > 0 {
        fraud_count as f64 / total_transactions as f64 * 100.0
    } else {
        0.0
    }
}
