//! In-memory ledger

use crate::error::StoreError;
use crate::feature_extractor::ActivityCounts;
use crate::store::{counts_including, CounterSource};
use crate::types::alert::FraudAlert;
use crate::types::decision::Decision;
use crate::types::rollup::{PumpRollup, TransactionRecord};
use crate::types::transaction::Transaction;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<TransactionRecord>,
    alerts: Vec<FraudAlert>,
    employee_counts: HashMap<u32, u64>,
    pump_counts: HashMap<u32, u64>,
    rollups: BTreeMap<u32, PumpRollup>,
}

/// Result of recording one transaction
#[derive(Debug, Clone)]
pub struct Ingested {
    pub record: TransactionRecord,
    /// Raised when the decision is fraud
    pub alert: Option<FraudAlert>,
    /// Rollup of the transaction's pump after the write
    pub rollup: PumpRollup,
}

/// Ledger guarded by a single mutex.
///
/// [`MemoryLedger::ingest`] reads the counters, scores, appends the record,
/// raises the alert and recomputes the rollup inside one critical section.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Score and record a transaction.
    ///
    /// `score` receives counts that include the transaction being recorded.
    /// If it fails, nothing is written.
    pub fn ingest<F, E>(&self, transaction: Transaction, score: F) -> Result<Ingested, E>
    where
        F: FnOnce(&Transaction, ActivityCounts) -> Result<Decision, E>,
        E: From<StoreError>,
    {
        let mut state = self.lock()?;

        let counts = counts_including(&*state, &transaction)?;
        let decision = score(&transaction, counts)?;

        state.employee_counts.insert(transaction.employee_id, counts.employee);
        state.pump_counts.insert(transaction.pump_id, counts.pump);

        let id = state.records.len() as u64 + 1;
        let pump_id = transaction.pump_id;
        let record = TransactionRecord::new(id, transaction, &decision);

        let alert = if decision.is_fraud {
            let alert = FraudAlert::new(id, decision.risk_level, &record.transaction);
            warn!(
                transaction_id = id,
                alert_id = %alert.alert_id,
                pump_id,
                employee_id = record.transaction.employee_id,
                risk_level = decision.risk_level.as_str(),
                confidence = decision.confidence,
                "Fraud alert raised"
            );
            state.alerts.push(alert.clone());
            Some(alert)
        } else {
            None
        };

        state.records.push(record.clone());
        let rollup = PumpRollup::recompute(pump_id, &state.records);
        state.rollups.insert(pump_id, rollup.clone());

        Ok(Ingested {
            record,
            alert,
            rollup,
        })
    }

    /// Mark an alert reviewed and return its updated state.
    pub fn review_alert(&self, alert_id: Uuid, reviewer: &str) -> Result<FraudAlert, StoreError> {
        let mut state = self.lock()?;
        let alert = state
            .alerts
            .iter_mut()
            .find(|a| a.alert_id == alert_id)
            .ok_or(StoreError::UnknownAlert(alert_id))?;
        alert.mark_reviewed(reviewer);

        info!(alert_id = %alert_id, reviewer, "Alert reviewed");
        Ok(alert.clone())
    }

    pub fn record(&self, id: u64) -> Result<Option<TransactionRecord>, StoreError> {
        let state = self.lock()?;
        let index = id.checked_sub(1).map(|i| i as usize);
        Ok(index.and_then(|i| state.records.get(i)).cloned())
    }

    pub fn records(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.lock()?.records.clone())
    }

    /// Most recent records first
    pub fn recent(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.lock()?.records.iter().rev().take(limit).cloned().collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn alerts(&self) -> Result<Vec<FraudAlert>, StoreError> {
        Ok(self.lock()?.alerts.clone())
    }

    pub fn unreviewed_alerts(&self) -> Result<Vec<FraudAlert>, StoreError> {
        Ok(self
            .lock()?
            .alerts
            .iter()
            .filter(|a| !a.reviewed)
            .cloned()
            .collect())
    }

    pub fn rollup(&self, pump_id: u32) -> Result<Option<PumpRollup>, StoreError> {
        Ok(self.lock()?.rollups.get(&pump_id).cloned())
    }

    /// Rollups ordered by pump id
    pub fn rollups(&self) -> Result<Vec<PumpRollup>, StoreError> {
        Ok(self.lock()?.rollups.values().cloned().collect())
    }
}

impl CounterSource for LedgerState {
    fn count_for_employee(&self, employee_id: u32) -> Result<u64, StoreError> {
        Ok(self.employee_counts.get(&employee_id).copied().unwrap_or(0))
    }

    fn count_for_pump(&self, pump_id: u32) -> Result<u64, StoreError> {
        Ok(self.pump_counts.get(&pump_id).copied().unwrap_or(0))
    }
}

impl CounterSource for MemoryLedger {
    fn count_for_employee(&self, employee_id: u32) -> Result<u64, StoreError> {
        self.lock()?.count_for_employee(employee_id)
    }

    fn count_for_pump(&self, pump_id: u32) -> Result<u64, StoreError> {
        self.lock()?.count_for_pump(pump_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoringError;
    use crate::types::alert::RiskLevel;
    use crate::types::decision::StrategyKind;
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Store(StoreError),
        Scoring(ScoringError),
    }

    impl From<StoreError> for TestError {
        fn from(e: StoreError) -> Self {
            TestError::Store(e)
        }
    }

    fn decision(fraud: bool) -> Decision {
        Decision {
            is_fraud: fraud,
            confidence: 0.5,
            risk_level: if fraud { RiskLevel::High } else { RiskLevel::Low },
            strategy: StrategyKind::RuleFallback,
            explanation: vec![],
        }
    }

    fn flag_if(
        fraud: bool,
    ) -> impl FnOnce(&Transaction, ActivityCounts) -> Result<Decision, TestError> {
        move |_, _| Ok(decision(fraud))
    }

    #[test]
    fn test_ids_start_at_one() {
        let ledger = MemoryLedger::new();
        let tx = Transaction::new(30.0, 1.5, 45.0, 1, 100);
        let first = ledger.ingest(tx.clone(), flag_if(false)).unwrap();
        let second = ledger.ingest(tx, flag_if(false)).unwrap();

        assert_eq!(first.record.id, 1);
        assert_eq!(second.record.id, 2);
        assert_eq!(ledger.record(2).unwrap().unwrap().id, 2);
        assert!(ledger.record(0).unwrap().is_none());
        assert!(ledger.record(3).unwrap().is_none());
    }

    #[test]
    fn test_counts_include_current_transaction() {
        let ledger = MemoryLedger::new();
        let mut seen = Vec::new();
        for pump in [1, 1, 2] {
            ledger
                .ingest(Transaction::new(30.0, 1.5, 45.0, pump, 100), |_, counts| {
                    seen.push(counts);
                    Ok::<_, TestError>(decision(false))
                })
                .unwrap();
        }

        assert_eq!(
            seen,
            vec![
                ActivityCounts::new(1, 1),
                ActivityCounts::new(2, 2),
                ActivityCounts::new(3, 1)
            ]
        );
        assert_eq!(ledger.count_for_employee(100).unwrap(), 3);
        assert_eq!(ledger.count_for_pump(1).unwrap(), 2);
        assert_eq!(ledger.count_for_pump(9).unwrap(), 0);

        // Next transaction on pump 1 would be the third there, fourth for 100
        let next = counts_including(&ledger, &Transaction::new(30.0, 1.5, 45.0, 1, 100));
        let next = next.unwrap();
        assert_eq!(next, ActivityCounts::new(4, 3));
    }

    #[test]
    fn test_failed_scoring_writes_nothing() {
        let ledger = MemoryLedger::new();
        let result = ledger.ingest(Transaction::new(30.0, 1.5, 45.0, 1, 100), |_, _| {
            Err::<Decision, _>(TestError::Scoring(ScoringError::Poisoned))
        });

        assert!(matches!(result, Err(TestError::Scoring(_))));
        assert!(ledger.is_empty().unwrap());
        assert_eq!(ledger.count_for_pump(1).unwrap(), 0);
        assert!(ledger.rollup(1).unwrap().is_none());
    }

    #[test]
    fn test_fraud_raises_alert() {
        let ledger = MemoryLedger::new();
        ledger.ingest(Transaction::new(30.0, 1.5, 45.0, 1, 100), flag_if(false)).unwrap();
        let ingested = ledger
            .ingest(Transaction::new(50.0, 1.5, 25.0, 4, 130), flag_if(true))
            .unwrap();

        let alert = ingested.alert.unwrap();
        assert_eq!(alert.transaction_id, 2);
        assert_eq!(alert.alert_level, RiskLevel::High);
        assert_eq!(ledger.alerts().unwrap().len(), 1);

        let reviewed = ledger.review_alert(alert.alert_id, "supervisor").unwrap();
        assert!(reviewed.reviewed);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("supervisor"));
        assert!(ledger.unreviewed_alerts().unwrap().is_empty());

        assert!(matches!(
            ledger.review_alert(Uuid::new_v4(), "supervisor"),
            Err(StoreError::UnknownAlert(_))
        ));
    }

    #[test]
    fn test_rollup_tracks_all_pump_records() {
        let ledger = MemoryLedger::new();
        ledger.ingest(Transaction::new(20.0, 1.5, 30.0, 3, 100), flag_if(false)).unwrap();
        ledger.ingest(Transaction::new(40.0, 1.5, 20.0, 3, 101), flag_if(true)).unwrap();
        ledger.ingest(Transaction::new(10.0, 1.5, 15.0, 5, 102), flag_if(false)).unwrap();
        let last = ledger
            .ingest(Transaction::new(30.0, 1.5, 45.0, 3, 100), flag_if(false))
            .unwrap();

        let rollup = ledger.rollup(3).unwrap().unwrap();
        assert_eq!(rollup, last.rollup);
        assert_eq!(rollup.total_transactions, 3);
        assert_eq!(rollup.fraud_count, 1);
        assert!((rollup.fraud_percentage - 100.0 / 3.0).abs() < 1e-9);
        assert!((rollup.total_fuel_dispensed - 90.0).abs() < 1e-9);
        assert!((rollup.total_revenue - 95.0).abs() < 1e-9);

        let pumps: Vec<u32> = ledger.rollups().unwrap().iter().map(|r| r.pump_id).collect();
        assert_eq!(pumps, vec![3, 5]);
        assert_eq!(ledger.recent(1).unwrap()[0].id, 4);
    }

    #[test]
    fn test_concurrent_ingest_keeps_rollups_consistent() {
        let ledger = Arc::new(MemoryLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let tx = Transaction::new(10.0, 1.5, 15.0, (i % 4) + 1, 100 + worker);
                        ledger.ingest(tx, flag_if(i % 5 == 0)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 400);
        let mut ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=400).collect::<Vec<_>>());

        let rollups = ledger.rollups().unwrap();
        for rollup in &rollups {
            let expected = PumpRollup::recompute(rollup.pump_id, &records);
            assert_eq!(rollup.total_transactions, expected.total_transactions);
            assert_eq!(rollup.fraud_count, expected.fraud_count);
        }
        assert_eq!(rollups.iter().map(|r| r.total_transactions).sum::<u64>(), 400);
        assert_eq!(rollups.iter().map(|r| r.fraud_count).sum::<u64>(), 80);
        assert_eq!(ledger.alerts().unwrap().len(), 80);
    }
}
