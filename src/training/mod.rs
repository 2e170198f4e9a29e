//! Offline training of the isolation forest artifact

pub mod dataset;
pub mod trainer;

pub use dataset::{DatasetGenerator, FraudKind, LabeledTransaction};
pub use trainer::{train, ConfusionMatrix, SweepPoint, TrainingConfig, TrainingOutcome};
