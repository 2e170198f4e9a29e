//! Isolation forest training and contamination sweep

use crate::error::ModelError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::isolation_forest::{ForestParams, IsolationForest};
use crate::models::loader::{ModelArtifact, TrainingSummary};
use crate::models::scaler::StandardScaler;
use crate::training::dataset::{derive_features, DatasetGenerator};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Parameters of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub samples: usize,
    pub fraud_fraction: f64,
    pub test_fraction: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination_grid: Vec<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples: 3000,
            fraud_fraction: 0.2,
            test_fraction: 0.2,
            seed: 42,
            n_estimators: 200,
            max_samples: 256,
            contamination_grid: vec![0.10, 0.15, 0.20, 0.25],
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<(), ModelError> {
        if self.samples < 50 {
            return Err(ModelError::Training(format!(
                "at least 50 samples are needed, got {}",
                self.samples
            )));
        }
        for (name, value) in [
            ("fraud_fraction", self.fraud_fraction),
            ("test_fraction", self.test_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ModelError::Training(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if self.contamination_grid.is_empty() {
            return Err(ModelError::Training("contamination grid is empty".into()));
        }
        Ok(())
    }

    fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            seed: self.seed,
        }
    }
}

/// Binary confusion matrix with fraud as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual_fraud: bool, predicted_fraud: bool) {
        match (actual_fraud, predicted_fraud) {
            (false, false) => self.true_negative += 1,
            (false, true) => self.false_positive += 1,
            (true, false) => self.false_negative += 1,
            (true, true) => self.true_positive += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negative + self.true_positive, self.total())
    }

    pub fn fraud_precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn fraud_recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn normal_precision(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_negative)
    }

    pub fn normal_recall(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Test accuracy at one contamination level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub contamination: f64,
    pub accuracy: f64,
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub sweep: Vec<SweepPoint>,
    /// Test split evaluated at the chosen contamination
    pub confusion: ConfusionMatrix,
}

/// Run the full training protocol and return the artifact.
pub fn train(config: &TrainingConfig) -> Result<TrainingOutcome, ModelError> {
    config.validate()?;
    let started = Instant::now();

    let normal_count = (config.samples as f64 * (1.0 - config.fraud_fraction)) as usize;
    let fraud_count = config.samples - normal_count;
    let rows = DatasetGenerator::new(config.seed).generate(normal_count, fraud_count);

    let features: Vec<Vec<f64>> = derive_features(&rows, &FeatureExtractor::new())
        .iter()
        .map(|f| f.to_array().to_vec())
        .collect();
    let labels: Vec<bool> = rows.iter().map(|r| r.is_fraud).collect();

    info!(
        total = rows.len(),
        normal = normal_count,
        fraud = fraud_count,
        "Synthetic dataset generated"
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let (train_idx, test_idx) = stratified_split(&labels, config.test_fraction, &mut rng);
    if test_idx.is_empty() {
        return Err(ModelError::Training("test split is empty".into()));
    }

    let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| features[i].clone()).collect();
    let scaler = StandardScaler::fit(&train_rows)?;

    let fit_rows = scaler.transform_all(
        train_idx
            .iter()
            .filter(|&&i| !labels[i])
            .map(|&i| features[i].as_slice()),
    )?;
    let test_rows = scaler.transform_all(test_idx.iter().map(|&i| features[i].as_slice()))?;
    let test_labels: Vec<bool> = test_idx.iter().map(|&i| labels[i]).collect();

    let mut forest = IsolationForest::fit(
        &fit_rows,
        &config.forest_params(),
        config.contamination_grid[0],
    )?;

    let training_scores = scores(&forest, &fit_rows)?;
    let test_scores = scores(&forest, &test_rows)?;

    let mut sweep = Vec::with_capacity(config.contamination_grid.len());
    let mut best: Option<SweepPoint> = None;
    for &contamination in &config.contamination_grid {
        forest.set_contamination(contamination, &training_scores)?;
        let accuracy = evaluate(forest.threshold(), &test_scores, &test_labels).accuracy();
        debug!(contamination, accuracy, "Contamination evaluated");

        let point = SweepPoint {
            contamination,
            accuracy,
        };
        if best.map_or(true, |b| accuracy > b.accuracy) {
            best = Some(point);
        }
        sweep.push(point);
    }
    let best = best
        .ok_or_else(|| ModelError::Training("contamination sweep produced no result".into()))?;

    forest.set_contamination(best.contamination, &training_scores)?;
    let confusion = evaluate(forest.threshold(), &test_scores, &test_labels);

    info!(
        contamination = best.contamination,
        accuracy = format!("{:.4}", best.accuracy),
        tn = confusion.true_negative,
        fp = confusion.false_positive,
        fn_ = confusion.false_negative,
        tp = confusion.true_positive,
        "Best contamination selected"
    );
    info!(
        normal_precision = format!("{:.3}", confusion.normal_precision()),
        normal_recall = format!("{:.3}", confusion.normal_recall()),
        fraud_precision = format!("{:.3}", confusion.fraud_precision()),
        fraud_recall = format!("{:.3}", confusion.fraud_recall()),
        "Classification report"
    );

    let training = TrainingSummary {
        total_samples: rows.len(),
        fraud_samples: fraud_count,
        normal_samples: normal_count,
        fitted_samples: fit_rows.len(),
        test_samples: test_rows.len(),
        test_accuracy: best.accuracy,
        contamination: best.contamination,
        trained_at: Utc::now(),
    };

    info!(
        trees = forest.tree_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Training complete"
    );

    Ok(TrainingOutcome {
        artifact: ModelArtifact::new(scaler, forest, training),
        sweep,
        confusion,
    })
}

fn scores(forest: &IsolationForest, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
    rows.iter()
        .map(|r| {
            forest
                .anomaly_score(r)
                .map_err(|e| ModelError::Dimension(e.to_string()))
        })
        .collect()
}

/// Scores strictly above the threshold are predicted fraud.
fn evaluate(threshold: f64, scores: &[f64], labels: &[bool]) -> ConfusionMatrix {
    let mut matrix = ConfusionMatrix::default();
    for (&score, &is_fraud) in scores.iter().zip(labels) {
        matrix.record(is_fraud, score > threshold);
    }
    matrix
}

/// Split indices so each class keeps its share in the test set.
pub fn stratified_split(
    labels: &[bool],
    test_fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [false, true] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(rng);
        let test_len = (members.len() as f64 * test_fraction).round() as usize;
        test.extend_from_slice(&members[..test_len]);
        train.extend_from_slice(&members[test_len..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}
