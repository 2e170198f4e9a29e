//! Transaction ledger: records, alerts, rollups and activity counters

pub mod memory;

pub use memory::{Ingested, MemoryLedger};

use crate::error::StoreError;
use crate::feature_extractor::ActivityCounts;
use crate::types::transaction::Transaction;

/// Source of the per-employee and per-pump transaction counts fed to the
/// feature extractor.
pub trait CounterSource {
    /// Transactions recorded so far for `employee_id`
    fn count_for_employee(&self, employee_id: u32) -> Result<u64, StoreError>;

    /// Transactions recorded so far for `pump_id`
    fn count_for_pump(&self, pump_id: u32) -> Result<u64, StoreError>;
}

/// Counts for `transaction` as if it were already recorded.
pub fn counts_including<S: CounterSource + ?Sized>(
    source: &S,
    transaction: &Transaction,
) -> Result<ActivityCounts, StoreError> {
    Ok(ActivityCounts::new(
        source.count_for_employee(transaction.employee_id)? + 1,
        source.count_for_pump(transaction.pump_id)? + 1,
    ))
}
