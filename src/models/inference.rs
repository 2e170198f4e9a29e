//! Fraud scoring with a hot-swappable strategy

use crate::config::AppConfig;
use crate::error::ScoringError;
use crate::explanation::ExplanationGenerator;
use crate::feature_extractor::{ActivityCounts, FeatureExtractor, FeatureVector, FEATURE_COLUMNS};
use crate::models::loader::{load_model, ModelArtifact};
use crate::models::rules::RuleScorer;
use crate::types::alert::{RiskLevel, RiskThresholds};
use crate::types::decision::{Decision, StrategyKind, Verdict};
use crate::types::transaction::Transaction;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// How verdicts are produced, chosen once when the detector is built or reloaded.
#[derive(Debug, Clone)]
pub enum ScoringStrategy {
    /// Scaled features through the isolation forest
    TrainedModel(ModelArtifact),
    /// Amount-difference rules
    RuleFallback(RuleScorer),
}

impl ScoringStrategy {
    /// Use the artifact at `path`, or the rules if it cannot be loaded.
    pub fn load_or_fallback<P: AsRef<Path>>(path: P, thresholds: RiskThresholds) -> Self {
        let path = path.as_ref();
        match load_model(path) {
            Ok(artifact) => ScoringStrategy::TrainedModel(artifact),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Trained model unavailable, falling back to rule-based scoring"
                );
                ScoringStrategy::RuleFallback(RuleScorer::new(thresholds))
            }
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            ScoringStrategy::TrainedModel(_) => StrategyKind::TrainedModel,
            ScoringStrategy::RuleFallback(_) => StrategyKind::RuleFallback,
        }
    }

    /// Score a feature vector. Both strategies reject non-finite features.
    pub fn score(&self, features: &FeatureVector) -> Result<Verdict, ScoringError> {
        let raw = features.to_array();
        if let Some((column, value)) = FEATURE_COLUMNS
            .iter()
            .zip(raw.iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(ScoringError::NonFiniteFeature {
                column: *column,
                value: *value,
            });
        }

        match self {
            ScoringStrategy::TrainedModel(artifact) => {
                let scaled = artifact.scaler.transform(&raw)?;
                let (is_outlier, decision) = artifact.forest.predict(&scaled)?;

                Ok(Verdict {
                    is_fraud: is_outlier,
                    confidence: decision.abs(),
                    risk_level: if is_outlier {
                        RiskLevel::High
                    } else {
                        RiskLevel::Low
                    },
                })
            }
            ScoringStrategy::RuleFallback(rules) => Ok(rules.score(features)),
        }
    }
}

/// Scores transactions against the currently installed strategy.
///
/// Each call works on one strategy snapshot; [`FraudDetector::swap`] replaces
/// the snapshot for later calls without disturbing calls in flight.
pub struct FraudDetector {
    strategy: RwLock<Arc<ScoringStrategy>>,
    extractor: FeatureExtractor,
    explainer: ExplanationGenerator,
    thresholds: RiskThresholds,
}

impl FraudDetector {
    /// Build the detector from configuration, loading the artifact if present.
    pub fn new(config: &AppConfig) -> Self {
        let thresholds = config.detection.risk_thresholds();
        let strategy =
            ScoringStrategy::load_or_fallback(&config.models.artifact_path, thresholds.clone());

        info!(
            strategy = strategy.kind().as_str(),
            artifact = %config.models.artifact_path,
            "Fraud detector initialized"
        );

        Self::with_strategy(
            strategy,
            FeatureExtractor::with_utc_offset_minutes(config.detection.station_utc_offset_minutes),
            ExplanationGenerator::new(config.detection.explain_deviation_pct),
            thresholds,
        )
    }

    pub fn with_strategy(
        strategy: ScoringStrategy,
        extractor: FeatureExtractor,
        explainer: ExplanationGenerator,
        thresholds: RiskThresholds,
    ) -> Self {
        Self {
            strategy: RwLock::new(Arc::new(strategy)),
            extractor,
            explainer,
            thresholds,
        }
    }

    /// Rule-only detector with default settings.
    pub fn rule_based() -> Self {
        Self::with_strategy(
            ScoringStrategy::RuleFallback(RuleScorer::default()),
            FeatureExtractor::new(),
            ExplanationGenerator::default(),
            RiskThresholds::default(),
        )
    }

    /// Current strategy snapshot
    pub fn current(&self) -> Result<Arc<ScoringStrategy>, ScoringError> {
        self.strategy
            .read()
            .map(|s| Arc::clone(&s))
            .map_err(|_| ScoringError::Poisoned)
    }

    pub fn strategy_kind(&self) -> Result<StrategyKind, ScoringError> {
        Ok(self.current()?.kind())
    }

    /// Install a new strategy, returning the previous one.
    pub fn swap(&self, strategy: ScoringStrategy) -> Result<Arc<ScoringStrategy>, ScoringError> {
        let kind = strategy.kind();
        let mut guard = self.strategy.write().map_err(|_| ScoringError::Poisoned)?;
        let previous = std::mem::replace(&mut *guard, Arc::new(strategy));
        info!(
            from = previous.kind().as_str(),
            to = kind.as_str(),
            "Scoring strategy swapped"
        );
        Ok(previous)
    }

    /// Reload the artifact at `path`; falls back to rules if it is unusable.
    pub fn reload<P: AsRef<Path>>(&self, path: P) -> Result<StrategyKind, ScoringError> {
        let strategy = ScoringStrategy::load_or_fallback(path, self.thresholds.clone());
        let kind = strategy.kind();
        self.swap(strategy)?;
        Ok(kind)
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Score one validated transaction with externally supplied counts.
    pub fn score(
        &self,
        tx: &Transaction,
        counts: ActivityCounts,
    ) -> Result<Decision, ScoringError> {
        let strategy = self.current()?;
        let features = self.extractor.extract(tx, counts);
        let verdict = strategy.score(&features)?;
        let explanation = self.explainer.explain(&features, &verdict);

        debug!(
            pump_id = tx.pump_id,
            employee_id = tx.employee_id,
            strategy = strategy.kind().as_str(),
            is_fraud = verdict.is_fraud,
            confidence = verdict.confidence,
            "Transaction scored"
        );

        Ok(Decision {
            is_fraud: verdict.is_fraud,
            confidence: verdict.confidence,
            risk_level: verdict.risk_level,
            strategy: strategy.kind(),
            explanation,
        })
    }
}
