//! Risk levels and fraud alert records

use crate::types::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify the absolute difference between charged and expected amount.
    ///
    /// Both bounds are exclusive: a difference of exactly `high` is Medium.
    pub fn from_difference(difference: f64, thresholds: &RiskThresholds) -> Self {
        if difference > thresholds.high {
            RiskLevel::High
        } else if difference > thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Operator-facing severity text.
    pub fn summary(&self) -> &'static str {
        match self {
            RiskLevel::High => "High Risk - Amount mismatch detected",
            RiskLevel::Medium => "Medium Risk - Minor discrepancy",
            RiskLevel::Low => "Low Risk - Transaction appears normal",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }
}

/// Amount-difference thresholds for the rule-based scorer (currency units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 5.0,
            high: 10.0,
        }
    }
}

/// Alert raised for a transaction flagged as fraud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Unique alert identifier
    pub alert_id: Uuid,

    /// Ledger id of the flagged transaction
    pub transaction_id: u64,

    pub alert_level: RiskLevel,

    pub alert_message: String,

    pub reviewed: bool,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,

    /// Alert generation timestamp
    pub created_at: DateTime<Utc>,
}

impl FraudAlert {
    /// Create a new alert for a recorded transaction
    pub fn new(transaction_id: u64, alert_level: RiskLevel, tx: &Transaction) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            transaction_id,
            alert_level,
            alert_message: format!(
                "Suspicious transaction detected: {}L @ ${}/L = ${} (Pump {}, Employee {})",
                tx.fuel_quantity, tx.rate_per_liter, tx.total_amount, tx.pump_id, tx.employee_id
            ),
            reviewed: false,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the alert as reviewed
    pub fn mark_reviewed(&mut self, reviewer: &str) {
        self.reviewed = true;
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_from_difference() {
        let thresholds = RiskThresholds::default();

        assert_eq!(RiskLevel::from_difference(0.005, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::from_difference(5.0, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::from_difference(7.5, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_difference(10.0, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_difference(50.0, &thresholds), RiskLevel::High);
    }

    #[test]
    fn test_alert_message() {
        let tx = Transaction::new(50.0, 1.5, 25.0, 4, 130);
        let mut alert = FraudAlert::new(7, RiskLevel::High, &tx);

        assert_eq!(
            alert.alert_message,
            "Suspicious transaction detected: 50L @ $1.5/L = $25 (Pump 4, Employee 130)"
        );
        assert!(!alert.reviewed);

        alert.mark_reviewed("shift-supervisor");
        assert!(alert.reviewed);
        assert_eq!(alert.reviewed_by.as_deref(), Some("shift-supervisor"));
        assert!(alert.reviewed_at.is_some());
    }

    #[test]
    fn test_alert_serialization() {
        let tx = Transaction::new(20.0, 1.4, 50.0, 1, 110);
        let alert = FraudAlert::new(1, RiskLevel::High, &tx);

        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("\"alert_level\":\"HIGH\""));

        let deserialized: FraudAlert = serde_json::from_str(&json).unwrap();
        assert_eq!(alert.alert_id, deserialized.alert_id);
        assert_eq!(alert.alert_level, deserialized.alert_level);
    }
}
