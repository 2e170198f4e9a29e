//! Fuel pump transaction input

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single pump transaction as reported by the point of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Metered fuel, in liters
    #[serde(alias = "fuel_qty")]
    pub fuel_quantity: f64,

    /// Posted price per liter
    #[serde(alias = "rate")]
    pub rate_per_liter: f64,

    /// Amount actually charged
    #[serde(alias = "amount")]
    pub total_amount: f64,

    /// Pump identifier
    pub pump_id: u32,

    /// Attendant identifier
    #[serde(alias = "emp_id")]
    pub employee_id: u32,

    /// When the transaction happened at the pump
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction stamped with the current time.
    pub fn new(
        fuel_quantity: f64,
        rate_per_liter: f64,
        total_amount: f64,
        pump_id: u32,
        employee_id: u32,
    ) -> Self {
        Self {
            fuel_quantity,
            rate_per_liter,
            total_amount,
            pump_id,
            employee_id,
            timestamp: Utc::now(),
        }
    }

    /// Override the transaction timestamp (replays, backfills).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Parse the raw form fields entered at the station.
    pub fn from_form(
        fuel_qty: &str,
        rate: &str,
        amount: &str,
        pump_id: &str,
        emp_id: &str,
    ) -> Result<Self, ValidationError> {
        let tx = Self::new(
            parse_float("fuel_quantity", fuel_qty)?,
            parse_float("rate_per_liter", rate)?,
            parse_float("total_amount", amount)?,
            parse_id("pump_id", pump_id)?,
            parse_id("employee_id", emp_id)?,
        );
        tx.validate()?;
        Ok(tx)
    }

    /// Check every field before feature derivation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("fuel_quantity", self.fuel_quantity),
            ("rate_per_liter", self.rate_per_liter),
            ("total_amount", self.total_amount),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NotFinite { field });
            }
            if value <= 0.0 {
                return Err(ValidationError::NonPositive { field, value });
            }
        }
        if !self.expected_amount().is_finite() {
            return Err(ValidationError::NotFinite {
                field: "expected_amount",
            });
        }
        if self.pump_id == 0 {
            return Err(ValidationError::ZeroId { field: "pump_id" });
        }
        if self.employee_id == 0 {
            return Err(ValidationError::ZeroId {
                field: "employee_id",
            });
        }
        Ok(())
    }

    /// Charge implied by the metered quantity and posted rate.
    pub fn expected_amount(&self) -> f64 {
        self.fuel_quantity * self.rate_per_liter
    }
}

fn parse_float(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::NotNumeric {
            field,
            value: raw.to_string(),
        })
}

fn parse_id(field: &'static str, raw: &str) -> Result<u32, ValidationError> {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(id) if id <= 0 => Err(ValidationError::ZeroId { field }),
        Ok(id) => u32::try_from(id).map_err(|_| ValidationError::NotNumeric {
            field,
            value: raw.to_string(),
        }),
        Err(_) => Err(ValidationError::NotNumeric {
            field,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_deserialization_aliases() {
        let json = r#"{"fuel_qty": 25.5, "rate": 1.45, "amount": 36.98, "pump_id": 3, "emp_id": 101,
                       "timestamp": "2024-03-04T10:15:00Z"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();

        assert_eq!(tx.fuel_quantity, 25.5);
        assert_eq!(tx.employee_id, 101);
        assert_eq!(tx.timestamp.to_rfc3339(), "2024-03-04T10:15:00+00:00");
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let before = Utc::now();
        let json = r#"{"fuel_quantity": 10.0, "rate_per_liter": 1.5, "total_amount": 15.0,
                       "pump_id": 1, "employee_id": 2}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.timestamp >= before);
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let tx = Transaction::new(0.0, 1.5, 10.0, 1, 1);
        assert_eq!(
            tx.validate(),
            Err(ValidationError::NonPositive {
                field: "fuel_quantity",
                value: 0.0
            })
        );

        let tx = Transaction::new(10.0, 1.5, -3.0, 1, 1);
        assert!(matches!(
            tx.validate(),
            Err(ValidationError::NonPositive {
                field: "total_amount",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_nan_and_zero_ids() {
        let tx = Transaction::new(10.0, f64::NAN, 10.0, 1, 1);
        assert_eq!(
            tx.validate(),
            Err(ValidationError::NotFinite {
                field: "rate_per_liter"
            })
        );

        let tx = Transaction::new(10.0, 1.5, 15.0, 0, 1);
        assert_eq!(tx.validate(), Err(ValidationError::ZeroId { field: "pump_id" }));
    }

    #[test]
    fn test_validate_rejects_overflowing_product() {
        let tx = Transaction::new(1e200, 1e200, 5.0, 1, 1);
        assert!(tx.expected_amount().is_infinite());
        assert_eq!(
            tx.validate(),
            Err(ValidationError::NotFinite {
                field: "expected_amount"
            })
        );
        assert_eq!(
            tx.validate().unwrap_err().user_message(),
            "Please enter valid numeric values"
        );
    }

    #[test]
    fn test_from_form() {
        let tx = Transaction::from_form("25.5", "1.45", " 36.98 ", "3", "101").unwrap();
        assert_eq!(tx.total_amount, 36.98);
        assert_eq!(tx.pump_id, 3);

        let err = Transaction::from_form("abc", "1.45", "36.98", "3", "101").unwrap_err();
        assert!(matches!(err, ValidationError::NotNumeric { field: "fuel_quantity", .. }));

        let err = Transaction::from_form("25.5", "1.45", "36.98", "-2", "101").unwrap_err();
        assert_eq!(err, ValidationError::ZeroId { field: "pump_id" });
    }
}
