//! Scoring decisions

use crate::types::alert::RiskLevel;
use serde::{Deserialize, Serialize};

/// Which scorer produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TrainedModel,
    RuleFallback,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TrainedModel => "trained_model",
            StrategyKind::RuleFallback => "rule_fallback",
        }
    }
}

/// Raw scorer verdict before it is narrated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub is_fraud: bool,
    /// Always non-negative
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

/// Fraud decision for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub is_fraud: bool,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub strategy: StrategyKind,
    /// Header, reasons, then the confidence line
    pub explanation: Vec<String>,
}

impl Decision {
    /// Severity text shown next to the decision
    pub fn summary(&self) -> &'static str {
        self.risk_level.summary()
    }
}
