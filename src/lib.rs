//! Fuel Fraud Detection Library
//!
//! Scores fuel pump transactions for fraud by comparing the charged amount
//! against quantity × rate, with a trained isolation forest when an artifact
//! is available and amount-difference rules otherwise.

pub mod config;
pub mod error;
pub mod explanation;
pub mod feature_extractor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use error::{ModelError, PipelineError, ScoringError, StoreError, ValidationError};
pub use feature_extractor::{ActivityCounts, FeatureExtractor, FeatureVector};
pub use models::inference::{FraudDetector, ScoringStrategy};
pub use pipeline::FraudPipeline;
pub use store::{CounterSource, MemoryLedger};
pub use types::{Decision, FraudAlert, PumpRollup, RiskLevel, Transaction};
