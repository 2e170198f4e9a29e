//! Model Trainer
//!
//! Generates the synthetic fuel transaction dataset, fits the scaler and the
//! isolation forest, sweeps contamination and writes the artifact.
//!
//! Usage: `train_model [OUTPUT_PATH]` (defaults to `models.artifact_path`).

use anyhow::{Context, Result};
use fuel_fraud_detection::{
    config::AppConfig,
    models::loader::save_model,
    training::train,
};
use tracing::info;

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    fuel_fraud_detection::logging::init(&config.logging)?;

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.models.artifact_path.clone());

    info!(
        samples = config.training.samples,
        seed = config.training.seed,
        n_estimators = config.training.n_estimators,
        grid = ?config.training.contamination_grid,
        "Training fraud detection model"
    );

    let outcome = train(&config.training).context("Training failed")?;

    for point in &outcome.sweep {
        info!(
            "Contamination {:.2}: accuracy {:.4}",
            point.contamination, point.accuracy
        );
    }

    let summary = &outcome.artifact.training;
    info!(
        "Confusion matrix (test split): [[{} {}] [{} {}]]",
        outcome.confusion.true_negative,
        outcome.confusion.false_positive,
        outcome.confusion.false_negative,
        outcome.confusion.true_positive
    );
    info!(
        "Fraud precision {:.3}, recall {:.3}",
        outcome.confusion.fraud_precision(),
        outcome.confusion.fraud_recall()
    );

    save_model(&outcome.artifact, &output)
        .with_context(|| format!("Failed to save model artifact to {}", output))?;

    info!(
        path = %output,
        contamination = summary.contamination,
        test_accuracy = summary.test_accuracy,
        "Model training completed"
    );

    Ok(())
}
