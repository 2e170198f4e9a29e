//! Rule-based scorer used when no trained artifact is available

use crate::feature_extractor::FeatureVector;
use crate::types::alert::{RiskLevel, RiskThresholds};
use crate::types::decision::Verdict;

/// Compares the charged amount against quantity × rate.
#[derive(Debug, Clone, Default)]
pub struct RuleScorer {
    thresholds: RiskThresholds,
}

impl RuleScorer {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// High risk is fraud; medium and low are not. Confidence is the amount
    /// deviation ratio, so it grows with the absolute difference.
    pub fn score(&self, features: &FeatureVector) -> Verdict {
        let difference = (features.total_amount - features.expected_amount()).abs();
        let risk_level = RiskLevel::from_difference(difference, &self.thresholds);

        Verdict {
            is_fraud: risk_level == RiskLevel::High,
            confidence: features.amount_deviation,
            risk_level,
        }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::ActivityCounts;
    use crate::types::transaction::Transaction;

    fn features(qty: f64, rate: f64, amount: f64) -> FeatureVector {
        FeatureVector::derive(
            &Transaction::new(qty, rate, amount, 1, 100),
            12,
            3,
            ActivityCounts::new(1, 1),
        )
    }

    #[test]
    fn test_matching_amount_is_low_risk() {
        let verdict = RuleScorer::default().score(&features(25.5, 1.45, 36.98));

        assert!(!verdict.is_fraud);
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert!(verdict.confidence < 0.001);
    }

    #[test]
    fn test_large_undercharge_is_high_risk() {
        let verdict = RuleScorer::default().score(&features(50.0, 1.50, 25.00));

        assert!(verdict.is_fraud);
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!((verdict.confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_minor_discrepancy_is_medium_risk() {
        // expected 60.00, charged 52.00
        let verdict = RuleScorer::default().score(&features(40.0, 1.50, 52.00));

        assert!(!verdict.is_fraud);
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_confidence_monotone_in_difference() {
        let scorer = RuleScorer::default();
        let mut previous = 0.0;
        for step in 0..60 {
            let amount = 60.0 + step as f64;
            let confidence = scorer.score(&features(40.0, 1.50, amount)).confidence;
            assert!(confidence >= previous);
            assert!(confidence >= 0.0);
            previous = confidence;
        }

        let mut previous = 0.0;
        for step in 0..59 {
            let amount = 60.0 - step as f64;
            let confidence = scorer.score(&features(40.0, 1.50, amount)).confidence;
            assert!(confidence >= previous);
            previous = confidence;
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let scorer = RuleScorer::new(RiskThresholds {
            medium: 1.0,
            high: 2.0,
        });
        // expected 60.00, charged 63.00
        assert!(scorer.score(&features(40.0, 1.50, 63.00)).is_fraud);
    }
}
