//! Type definitions for fuel fraud detection

pub mod alert;
pub mod decision;
pub mod rollup;
pub mod transaction;

pub use alert::{FraudAlert, RiskLevel, RiskThresholds};
pub use decision::{Decision, StrategyKind, Verdict};
pub use rollup::{PumpRollup, TransactionRecord};
pub use transaction::Transaction;
