//! Anomaly scoring components

pub mod inference;
pub mod isolation_forest;
pub mod loader;
pub mod rules;
pub mod scaler;

pub use inference::{FraudDetector, ScoringStrategy};
pub use isolation_forest::{ForestParams, IsolationForest};
pub use loader::{load_model, save_model, ModelArtifact, TrainingSummary};
pub use rules::RuleScorer;
pub use scaler::StandardScaler;
