//! Feature derivation for fuel transaction scoring.
//!
//! Turns a transaction plus its activity counters into the 13-column
//! feature vector the isolation forest is trained on. Column order is part
//! of the model artifact and must not change without retraining.

use crate::types::transaction::Transaction;
use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Column names in model input order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "fuel_quantity",
    "rate_per_liter",
    "total_amount",
    "pump_id",
    "employee_id",
    "hour_of_day",
    "day_of_week",
    "amount_deviation",
    "rate_deviation",
    "quantity_anomaly",
    "is_unusual_hour",
    "emp_transaction_count",
    "pump_transaction_count",
];

pub const FEATURE_COUNT: usize = 13;

/// Posted-rate band considered normal, per liter.
pub const NORMAL_RATE_MIN: f64 = 1.20;
pub const NORMAL_RATE_MAX: f64 = 2.00;

/// Quantity band considered normal, in liters.
pub const NORMAL_QUANTITY_MIN: f64 = 10.0;
pub const NORMAL_QUANTITY_MAX: f64 = 80.0;

/// Operating hours; anything before the first or after the last is unusual.
pub const BUSINESS_HOUR_FIRST: u32 = 6;
pub const BUSINESS_HOUR_LAST: u32 = 22;

/// Transaction counts for the attendant and pump, including the transaction
/// being scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub employee: u64,
    pub pump: u64,
}

impl ActivityCounts {
    pub fn new(employee: u64, pump: u64) -> Self {
        Self { employee, pump }
    }
}

/// Derived features for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub fuel_quantity: f64,
    pub rate_per_liter: f64,
    pub total_amount: f64,
    pub pump_id: u32,
    pub employee_id: u32,
    pub hour_of_day: u32,
    /// Monday = 1 .. Sunday = 7
    pub day_of_week: u32,
    pub amount_deviation: f64,
    pub rate_deviation: f64,
    pub quantity_anomaly: bool,
    pub is_unusual_hour: bool,
    pub emp_transaction_count: u64,
    pub pump_transaction_count: u64,
}

impl FeatureVector {
    /// Derive features with an explicit hour and weekday.
    pub fn derive(
        tx: &Transaction,
        hour_of_day: u32,
        day_of_week: u32,
        counts: ActivityCounts,
    ) -> Self {
        Self {
            fuel_quantity: tx.fuel_quantity,
            rate_per_liter: tx.rate_per_liter,
            total_amount: tx.total_amount,
            pump_id: tx.pump_id,
            employee_id: tx.employee_id,
            hour_of_day,
            day_of_week,
            amount_deviation: amount_deviation(
                tx.fuel_quantity,
                tx.rate_per_liter,
                tx.total_amount,
            ),
            rate_deviation: rate_deviation(tx.rate_per_liter),
            quantity_anomaly: is_quantity_anomaly(tx.fuel_quantity),
            is_unusual_hour: is_unusual_hour(hour_of_day),
            emp_transaction_count: counts.employee,
            pump_transaction_count: counts.pump,
        }
    }

    pub fn expected_amount(&self) -> f64 {
        self.fuel_quantity * self.rate_per_liter
    }

    /// Model input in `FEATURE_COLUMNS` order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.fuel_quantity,
            self.rate_per_liter,
            self.total_amount,
            self.pump_id as f64,
            self.employee_id as f64,
            self.hour_of_day as f64,
            self.day_of_week as f64,
            self.amount_deviation,
            self.rate_deviation,
            flag(self.quantity_anomaly),
            flag(self.is_unusual_hour),
            self.emp_transaction_count as f64,
            self.pump_transaction_count as f64,
        ]
    }
}

/// Feature extractor that reads time-of-day in the station's local time.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    station_offset: FixedOffset,
}

impl FeatureExtractor {
    /// Create an extractor reading hours in UTC.
    pub fn new() -> Self {
        Self {
            station_offset: Utc.fix(),
        }
    }

    /// Create an extractor for a station `minutes` east of UTC.
    ///
    /// Offsets of a day or more fall back to UTC.
    pub fn with_utc_offset_minutes(minutes: i32) -> Self {
        match minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
        {
            Some(station_offset) => Self { station_offset },
            None => {
                tracing::warn!(minutes, "Invalid station UTC offset, using UTC");
                Self::new()
            }
        }
    }

    /// Extract features from a transaction.
    pub fn extract(&self, tx: &Transaction, counts: ActivityCounts) -> FeatureVector {
        let (hour, weekday) = self.local_time(tx.timestamp);
        FeatureVector::derive(tx, hour, weekday, counts)
    }

    /// Hour (0-23) and ISO weekday (1-7) at the station.
    pub fn local_time(&self, timestamp: DateTime<Utc>) -> (u32, u32) {
        let local = timestamp.with_timezone(&self.station_offset);
        (local.hour(), local.weekday().number_from_monday())
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_COLUMNS
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// `|total - qty*rate| / (qty*rate)`, or 0 when nothing was expected.
pub fn amount_deviation(fuel_quantity: f64, rate_per_liter: f64, total_amount: f64) -> f64 {
    let expected = fuel_quantity * rate_per_liter;
    if expected > 0.0 {
        (total_amount - expected).abs() / expected
    } else {
        0.0
    }
}

/// Distance of an out-of-band rate from the band midpoint, in half-widths.
pub fn rate_deviation(rate_per_liter: f64) -> f64 {
    if is_rate_out_of_range(rate_per_liter) {
        let midpoint = (NORMAL_RATE_MIN + NORMAL_RATE_MAX) / 2.0;
        let half_width = (NORMAL_RATE_MAX - NORMAL_RATE_MIN) / 2.0;
        (rate_per_liter - midpoint).abs() / half_width
    } else {
        0.0
    }
}

pub fn is_rate_out_of_range(rate_per_liter: f64) -> bool {
    rate_per_liter < NORMAL_RATE_MIN || rate_per_liter > NORMAL_RATE_MAX
}

pub fn is_quantity_anomaly(fuel_quantity: f64) -> bool {
    fuel_quantity < NORMAL_QUANTITY_MIN || fuel_quantity > NORMAL_QUANTITY_MAX
}

pub fn is_unusual_hour(hour_of_day: u32) -> bool {
    hour_of_day < BUSINESS_HOUR_FIRST || hour_of_day > BUSINESS_HOUR_LAST
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
