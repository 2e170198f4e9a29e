//! Per-feature standardization (zero mean, unit variance)

use crate::error::{ModelError, ScoringError};
use serde::{Deserialize, Serialize};

/// Fitted means and scales, one entry per feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    /// Population standard deviation; constant columns get 1.0
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on the rows of a training split.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ModelError> {
        let width = match rows.first() {
            Some(row) => row.len(),
            None => return Err(ModelError::Training("no rows to fit scaler on".into())),
        };
        if rows.iter().any(|r| r.len() != width) {
            return Err(ModelError::Dimension("ragged training rows".into()));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }

        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one row.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ScoringError> {
        if row.len() != self.width() {
            return Err(ScoringError::Dimension {
                expected: self.width(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Standardize many rows (training only).
    pub(crate) fn transform_all<'a, I>(&self, rows: I) -> Result<Vec<Vec<f64>>, ModelError>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        rows.into_iter()
            .map(|row| {
                self.transform(row)
                    .map_err(|e| ModelError::Dimension(e.to_string()))
            })
            .collect()
    }

    pub(crate) fn check(&self) -> Result<(), ModelError> {
        if self.mean.len() != self.scale.len() {
            return Err(ModelError::Dimension(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ModelError::Dimension("scaler has a non-positive scale".into()));
        }
        Ok(())
    }
}
