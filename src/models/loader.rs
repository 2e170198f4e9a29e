//! Model artifact persistence

use crate::error::ModelError;
use crate::feature_extractor::{FEATURE_COLUMNS, FEATURE_COUNT};
use crate::models::isolation_forest::IsolationForest;
use crate::models::scaler::StandardScaler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Bumped whenever the artifact layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Summary recorded by the training job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub total_samples: usize,
    pub fraud_samples: usize,
    pub normal_samples: usize,
    /// Normal rows of the train split the forest was fitted on
    pub fitted_samples: usize,
    pub test_samples: usize,
    pub test_accuracy: f64,
    pub contamination: f64,
    pub trained_at: DateTime<Utc>,
}

/// Everything the trained strategy needs at inference time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_columns: Vec<String>,
    pub scaler: StandardScaler,
    pub forest: IsolationForest,
    pub training: TrainingSummary,
}

impl ModelArtifact {
    pub fn new(scaler: StandardScaler, forest: IsolationForest, training: TrainingSummary) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            scaler,
            forest,
            training,
        }
    }

    /// Check version, column order and internal consistency.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: self.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }

        for (position, expected) in FEATURE_COLUMNS.iter().copied().enumerate() {
            match self.feature_columns.get(position) {
                Some(found) if found == expected => {}
                found => {
                    return Err(ModelError::ColumnMismatch {
                        position,
                        found: found.cloned().unwrap_or_default(),
                        expected,
                    })
                }
            }
        }
        if self.feature_columns.len() != FEATURE_COUNT {
            return Err(ModelError::Dimension(format!(
                "artifact lists {} feature columns, expected {}",
                self.feature_columns.len(),
                FEATURE_COUNT
            )));
        }

        self.scaler.check()?;
        if self.scaler.width() != FEATURE_COUNT || self.forest.n_features() != FEATURE_COUNT {
            return Err(ModelError::Dimension(format!(
                "scaler width {} / forest width {} do not match {} features",
                self.scaler.width(),
                self.forest.n_features(),
                FEATURE_COUNT
            )));
        }
        self.forest.check()
    }
}

/// Load and validate a model artifact.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ModelArtifact, ModelError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let artifact: ModelArtifact = serde_json::from_slice(&data)?;
    artifact.validate()?;

    info!(
        path = %path.display(),
        trees = artifact.forest.tree_count(),
        contamination = artifact.training.contamination,
        test_accuracy = artifact.training.test_accuracy,
        "Model artifact loaded"
    );

    Ok(artifact)
}

/// Write an artifact so that readers see either the old file or the new one.
///
/// The JSON goes to a sibling temp file, is synced, then renamed over `path`.
pub fn save_model<P: AsRef<Path>>(artifact: &ModelArtifact, path: P) -> Result<(), ModelError> {
    let path = path.as_ref();
    let io_err = |source: std::io::Error| ModelError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_vec(artifact)?;
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }

    info!(path = %path.display(), bytes = json.len(), "Model artifact saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "model".into());
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
