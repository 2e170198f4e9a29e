//! Isolation forest anomaly detector.
//!
//! Trees isolate points with random axis-aligned splits; anomalies need
//! fewer splits. The anomaly score is `2^(-E[h(x)] / c(psi))` where `h` is the
//! path length and `c` the average path length of an unsuccessful BST search
//! over `psi` points. Scores near 1 are anomalous; the fitted threshold is the
//! training-score quantile matching the contamination fraction.

use crate::error::{ModelError, ScoringError};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Upper bound on the per-tree subsample size
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_samples: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One isolation tree stored as an arena; the root is node 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(rows: &[Vec<f64>], sample: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        grow_node(&mut nodes, rows, sample, 0, height_limit, rng);
        Self { nodes }
    }

    /// Path length of `x`, with the unresolved-leaf correction.
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut id = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[id] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }

    fn check(&self, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Dimension("empty isolation tree".into()));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                // Children always follow their parent, which also rules out cycles
                let in_bounds = |child: usize| child > id && child < self.nodes.len();
                if *feature >= n_features
                    || !threshold.is_finite()
                    || !in_bounds(*left)
                    || !in_bounds(*right)
                {
                    return Err(ModelError::Dimension(format!("malformed split node {}", id)));
                }
            }
        }
        Ok(())
    }
}

fn grow_node(
    nodes: &mut Vec<Node>,
    rows: &[Vec<f64>],
    sample: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> usize {
    let id = nodes.len();
    nodes.push(Node::Leaf { size: sample.len() });

    if depth >= height_limit || sample.len() <= 1 {
        return id;
    }

    // Only features that still vary inside this node can split it
    let n_features = rows[sample[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|feature| {
            let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][feature]), hi.max(rows[i][feature]))
            });
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        return id;
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left_sample, right_sample): (Vec<usize>, Vec<usize>) =
        sample.into_iter().partition(|&i| rows[i][feature] < threshold);

    let left = grow_node(nodes, rows, left_sample, depth + 1, height_limit, rng);
    let right = grow_node(nodes, rows, right_sample, depth + 1, height_limit, rng);
    nodes[id] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    id
}

/// Average path length of an unsuccessful search in a BST of `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Fitted forest with its decision threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Subsample size each tree was grown on
    sample_size: usize,
    n_features: usize,
    contamination: f64,
    /// Anomaly scores strictly above this are outliers
    threshold: f64,
}

impl IsolationForest {
    /// Grow the forest on (already scaled) rows. The threshold starts at the
    /// given contamination quantile of the training scores.
    pub fn fit(
        rows: &[Vec<f64>],
        params: &ForestParams,
        contamination: f64,
    ) -> Result<Self, ModelError> {
        if rows.len() < 2 {
            return Err(ModelError::Training(format!(
                "isolation forest needs at least 2 rows, got {}",
                rows.len()
            )));
        }
        if params.n_estimators == 0 || params.max_samples < 2 {
            return Err(ModelError::Training(
                "n_estimators must be positive and max_samples at least 2".into(),
            ));
        }
        let n_features = rows[0].len();
        if rows.iter().any(|r| r.len() != n_features) {
            return Err(ModelError::Dimension("ragged training rows".into()));
        }

        let sample_size = params.max_samples.min(rows.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, rows.len(), sample_size).into_vec();
                IsolationTree::grow(rows, sample, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            n_features,
            contamination,
            threshold: 0.5,
        };
        let training_scores: Vec<f64> = rows.iter().map(|r| forest.raw_score(r)).collect();
        forest.set_contamination(contamination, &training_scores)?;

        debug!(
            trees = forest.trees.len(),
            sample_size,
            height_limit,
            threshold = forest.threshold,
            "Isolation forest fitted"
        );

        Ok(forest)
    }

    /// Move the threshold to the `1 - contamination` quantile of `training_scores`.
    pub fn set_contamination(
        &mut self,
        contamination: f64,
        training_scores: &[f64],
    ) -> Result<(), ModelError> {
        if !(contamination > 0.0 && contamination < 0.5) {
            return Err(ModelError::Training(format!(
                "contamination must be in (0, 0.5), got {}",
                contamination
            )));
        }
        if training_scores.is_empty() {
            return Err(ModelError::Training("no training scores".into()));
        }
        self.threshold = quantile(training_scores, 1.0 - contamination);
        self.contamination = contamination;
        Ok(())
    }

    /// Anomaly score in (0, 1]; higher is more anomalous.
    pub fn anomaly_score(&self, x: &[f64]) -> Result<f64, ScoringError> {
        if x.len() != self.n_features {
            return Err(ScoringError::Dimension {
                expected: self.n_features,
                actual: x.len(),
            });
        }
        Ok(self.raw_score(x))
    }

    fn raw_score(&self, x: &[f64]) -> f64 {
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.sample_size))
    }

    /// Signed distance to the threshold: negative for outliers.
    pub fn decision_function(&self, x: &[f64]) -> Result<f64, ScoringError> {
        Ok(self.threshold - self.anomaly_score(x)?)
    }

    /// Outlier label and decision value in one pass.
    pub fn predict(&self, x: &[f64]) -> Result<(bool, f64), ScoringError> {
        let decision = self.decision_function(x)?;
        Ok((decision < 0.0, decision))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn check(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() || self.sample_size < 2 {
            return Err(ModelError::Dimension("forest has no usable trees".into()));
        }
        if !self.threshold.is_finite() {
            return Err(ModelError::Dimension("forest threshold is not finite".into()));
        }
        self.trees.iter().try_for_each(|t| t.check(self.n_features))
    }
}

/// Linearly interpolated quantile, `q` in [0, 1].
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(n: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                vec![
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ]
            })
            .collect()
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 100,
            max_samples: 128,
            seed: 7,
        }
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) from the isolation forest paper
        assert!((average_path_length(256) - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_outlier_scores_higher_than_inlier() {
        let rows = cluster(500, 1);
        let forest = IsolationForest::fit(&rows, &small_params(), 0.1).unwrap();

        let inlier = forest.anomaly_score(&[0.0, 0.0, 0.0]).unwrap();
        let outlier = forest.anomaly_score(&[8.0, -9.0, 7.0]).unwrap();

        assert!(outlier > inlier);
        assert!(outlier > 0.55);
        assert!(forest.predict(&[8.0, -9.0, 7.0]).unwrap().0);
        assert!(!forest.predict(&[0.0, 0.0, 0.0]).unwrap().0);
    }

    #[test]
    fn test_contamination_sets_training_outlier_share() {
        let rows = cluster(400, 2);
        let forest = IsolationForest::fit(&rows, &small_params(), 0.2).unwrap();

        let flagged = rows
            .iter()
            .filter(|r| forest.predict(r).unwrap().0)
            .count();
        let share = flagged as f64 / rows.len() as f64;
        assert!((share - 0.2).abs() < 0.02, "share = {}", share);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let rows = cluster(200, 3);
        let a = IsolationForest::fit(&rows, &small_params(), 0.1).unwrap();
        let b = IsolationForest::fit(&rows, &small_params(), 0.1).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            a.anomaly_score(&[0.3, 0.1, -0.5]).unwrap(),
            b.anomaly_score(&[0.3, 0.1, -0.5]).unwrap()
        );
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let forest = IsolationForest::fit(&cluster(50, 4), &small_params(), 0.1).unwrap();
        assert!(matches!(
            forest.anomaly_score(&[1.0]),
            Err(ScoringError::Dimension { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(IsolationForest::fit(&[vec![1.0]], &small_params(), 0.1).is_err());
        assert!(IsolationForest::fit(&cluster(20, 5), &small_params(), 0.7).is_err());
    }

    #[test]
    fn test_check_accepts_fitted_forest() {
        let forest = IsolationForest::fit(&cluster(64, 6), &small_params(), 0.15).unwrap();
        assert!(forest.check().is_ok());
        assert!(forest.tree_count() == 100);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
    }
}
