//! Error types for validation, scoring, model artifacts and the ledger

use std::path::PathBuf;
use thiserror::Error;

/// Rejection of a transaction before any feature is derived.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a numeric value, got {value:?}")]
    NotNumeric { field: &'static str, value: String },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be a positive integer")]
    ZeroId { field: &'static str },
}

impl ValidationError {
    /// Message suitable for showing to the operator who entered the transaction.
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::NotNumeric { .. } | ValidationError::NotFinite { .. } => {
                "Please enter valid numeric values"
            }
            ValidationError::NonPositive { .. } => "Quantities and rates must be positive",
            ValidationError::ZeroId { .. } => {
                "Pump ID and Employee ID must be positive integers"
            }
        }
    }
}

/// Failure inside the scorer. The transaction counts as not scored.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("feature {column} is not finite ({value})")]
    NonFiniteFeature { column: &'static str, value: f64 },

    #[error("model expects {expected} features, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("detector lock poisoned")]
    Poisoned,
}

/// Problems reading, writing or validating a model artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to access model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Format(#[from] serde_json::Error),

    #[error("unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("feature column mismatch at position {position}: artifact has {found:?}, expected {expected:?}")]
    ColumnMismatch {
        position: usize,
        found: String,
        expected: &'static str,
    },

    #[error("inconsistent artifact: {0}")]
    Dimension(String),

    #[error("cannot train: {0}")]
    Training(String),
}

/// Ledger failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger lock poisoned")]
    Poisoned,

    #[error("no alert with id {0}")]
    UnknownAlert(uuid::Uuid),
}

/// Anything that keeps a submitted transaction from being recorded.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid transaction: {0}")]
    Validation(#[from] ValidationError),

    #[error("transaction not scored: {0}")]
    Scoring(#[from] ScoringError),

    #[error("ledger error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = ValidationError::NonPositive {
            field: "fuel_quantity",
            value: -1.0,
        };
        assert_eq!(err.user_message(), "Quantities and rates must be positive");
        assert_eq!(
            ValidationError::ZeroId { field: "pump_id" }.user_message(),
            "Pump ID and Employee ID must be positive integers"
        );
    }

    #[test]
    fn test_pipeline_error_keeps_cause() {
        let err: PipelineError = ScoringError::Dimension {
            expected: 13,
            actual: 5,
        }
        .into();
        assert!(err.to_string().starts_with("transaction not scored"));
        assert!(err.to_string().contains("13"));
    }
}
