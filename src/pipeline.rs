//! Validate, score and record transactions

use crate::error::{PipelineError, ValidationError};
use crate::metrics::ScoringMetrics;
use crate::models::inference::FraudDetector;
use crate::store::{Ingested, MemoryLedger};
use crate::types::transaction::Transaction;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Ties the detector to the ledger.
pub struct FraudPipeline {
    detector: Arc<FraudDetector>,
    ledger: Arc<MemoryLedger>,
    metrics: Arc<ScoringMetrics>,
}

impl FraudPipeline {
    pub fn new(
        detector: Arc<FraudDetector>,
        ledger: Arc<MemoryLedger>,
        metrics: Arc<ScoringMetrics>,
    ) -> Self {
        Self {
            detector,
            ledger,
            metrics,
        }
    }

    pub fn detector(&self) -> &FraudDetector {
        &self.detector
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub fn metrics(&self) -> &ScoringMetrics {
        &self.metrics
    }

    /// Validate, score and record one transaction.
    ///
    /// Invalid transactions and scoring failures leave the ledger untouched.
    pub fn submit(&self, transaction: Transaction) -> Result<Ingested, PipelineError> {
        let started = Instant::now();

        if let Err(e) = transaction.validate() {
            return Err(self.rejected(e));
        }

        let pump_id = transaction.pump_id;
        let detector = &self.detector;
        let result = self.ledger.ingest(transaction, |tx, counts| {
            detector.score(tx, counts).map_err(PipelineError::from)
        });

        match result {
            Ok(ingested) => {
                self.metrics.record_scored(&ingested.record, started.elapsed());
                debug!(
                    transaction_id = ingested.record.id,
                    pump_id,
                    is_fraud = ingested.record.is_fraud,
                    processing_time_us = started.elapsed().as_micros() as u64,
                    "Transaction recorded"
                );
                Ok(ingested)
            }
            Err(e) => {
                self.metrics.record_failed();
                error!(pump_id, error = %e, "Transaction not recorded");
                Err(e)
            }
        }
    }

    /// Parse raw form fields, then submit.
    pub fn submit_form(
        &self,
        fuel_quantity: &str,
        rate_per_liter: &str,
        total_amount: &str,
        pump_id: &str,
        employee_id: &str,
    ) -> Result<Ingested, PipelineError> {
        let transaction = Transaction::from_form(
            fuel_quantity,
            rate_per_liter,
            total_amount,
            pump_id,
            employee_id,
        )
        .map_err(|e| self.rejected(e))?;
        self.submit(transaction)
    }

    fn rejected(&self, e: ValidationError) -> PipelineError {
        self.metrics.record_rejected();
        warn!(error = %e, "Transaction rejected");
        PipelineError::Validation(e)
    }
}
