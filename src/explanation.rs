//! Human-readable narration of a scoring verdict.
//!
//! The generator never changes the verdict; it reads the features and the
//! verdict and produces a header, the applicable reasons in fixed priority
//! order, and a closing confidence line.

use crate::feature_extractor::{
    FeatureVector, NORMAL_QUANTITY_MAX, NORMAL_QUANTITY_MIN, NORMAL_RATE_MAX, NORMAL_RATE_MIN,
};
use crate::types::decision::Verdict;

pub const FRAUD_HEADER: &str = "FRAUD DETECTED";
pub const NORMAL_HEADER: &str = "NORMAL";

#[derive(Debug, Clone)]
pub struct ExplanationGenerator {
    /// Amount deviation (percent) above which the fraud path cites the charge
    deviation_pct_threshold: f64,
}

impl ExplanationGenerator {
    pub fn new(deviation_pct_threshold: f64) -> Self {
        Self {
            deviation_pct_threshold,
        }
    }

    pub fn explain(&self, features: &FeatureVector, verdict: &Verdict) -> Vec<String> {
        let mut lines = Vec::with_capacity(6);

        if verdict.is_fraud {
            lines.push(FRAUD_HEADER.to_string());
            lines.extend(self.fraud_reasons(features));
        } else {
            lines.push(NORMAL_HEADER.to_string());
            lines.push(format!(
                "Amount matches expected: ${:.2} ≈ ${:.2}",
                features.total_amount,
                features.expected_amount()
            ));
            lines.push(format!("Normal fuel rate: ${:.2}/L", features.rate_per_liter));
            lines.push(format!("Reasonable quantity: {:.2}L", features.fuel_quantity));
        }

        lines.push(format!("Confidence: {:.3}", verdict.confidence));
        lines
    }

    fn fraud_reasons(&self, features: &FeatureVector) -> Vec<String> {
        let mut reasons = Vec::new();
        let expected = features.expected_amount();
        let difference = (features.total_amount - expected).abs();
        let deviation_pct = features.amount_deviation * 100.0;

        if deviation_pct > self.deviation_pct_threshold {
            let direction = if features.total_amount < expected {
                "Undercharged"
            } else {
                "Overcharged"
            };
            reasons.push(format!("{} by ${:.2} ({:.1}%)", direction, difference, deviation_pct));
        }

        if features.rate_per_liter < NORMAL_RATE_MIN {
            reasons.push(format!("Unusually low fuel rate: ${:.2}/L", features.rate_per_liter));
        } else if features.rate_per_liter > NORMAL_RATE_MAX {
            reasons.push(format!("Unusually high fuel rate: ${:.2}/L", features.rate_per_liter));
        }

        if features.fuel_quantity < NORMAL_QUANTITY_MIN {
            reasons.push(format!("Suspiciously low fuel quantity: {:.2}L", features.fuel_quantity));
        } else if features.fuel_quantity > NORMAL_QUANTITY_MAX {
            reasons.push(format!(
                "Suspiciously high fuel quantity: {:.2}L",
                features.fuel_quantity
            ));
        }

        if features.is_unusual_hour {
            reasons.push("Transaction during unusual hours".to_string());
        }

        reasons
    }
}

impl Default for ExplanationGenerator {
    fn default() -> Self {
        Self::new(20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::ActivityCounts;
    use crate::types::alert::RiskLevel;
    use crate::types::transaction::Transaction;

    fn features(qty: f64, rate: f64, amount: f64, hour: u32) -> FeatureVector {
        FeatureVector::derive(
            &Transaction::new(qty, rate, amount, 2, 120),
            hour,
            5,
            ActivityCounts::new(3, 9),
        )
    }

    fn verdict(is_fraud: bool, confidence: f64) -> Verdict {
        Verdict {
            is_fraud,
            confidence,
            risk_level: if is_fraud { RiskLevel::High } else { RiskLevel::Low },
        }
    }

    #[test]
    fn test_normal_explanation() {
        let lines = ExplanationGenerator::default()
            .explain(&features(25.5, 1.45, 36.98, 10), &verdict(false, 0.12345));

        assert_eq!(
            lines,
            vec![
                "NORMAL",
                "Amount matches expected: $36.98 ≈ $36.98",
                "Normal fuel rate: $1.45/L",
                "Reasonable quantity: 25.50L",
                "Confidence: 0.123",
            ]
        );
    }

    #[test]
    fn test_undercharge_explanation() {
        let lines = ExplanationGenerator::default()
            .explain(&features(50.0, 1.50, 25.00, 14), &verdict(true, 0.6667));

        assert_eq!(lines[0], "FRAUD DETECTED");
        assert_eq!(lines[1], "Undercharged by $50.00 (66.7%)");
        assert_eq!(lines.last().unwrap(), "Confidence: 0.667");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_reason_priority_order() {
        // Overcharged, high rate, high quantity, 03:00
        let lines = ExplanationGenerator::default()
            .explain(&features(150.0, 3.50, 800.00, 3), &verdict(true, 0.2));

        assert_eq!(
            lines,
            vec![
                "FRAUD DETECTED",
                "Overcharged by $275.00 (52.4%)",
                "Unusually high fuel rate: $3.50/L",
                "Suspiciously high fuel quantity: 150.00L",
                "Transaction during unusual hours",
                "Confidence: 0.200",
            ]
        );
    }

    #[test]
    fn test_small_deviation_not_cited() {
        // 10% overcharge stays below the 20% citation threshold
        let lines = ExplanationGenerator::default()
            .explain(&features(2.0, 0.80, 1.76, 12), &verdict(true, 0.05));

        assert_eq!(
            lines,
            vec![
                "FRAUD DETECTED",
                "Unusually low fuel rate: $0.80/L",
                "Suspiciously low fuel quantity: 2.00L",
                "Confidence: 0.050",
            ]
        );
    }

    #[test]
    fn test_explanation_does_not_touch_verdict() {
        let v = verdict(true, 0.42);
        let before = v;
        let _ = ExplanationGenerator::default().explain(&features(30.0, 1.7, 20.0, 12), &v);
        assert_eq!(v, before);
    }
}
