//! Isolation forest: an ensemble of random partitioning trees. Anomalies are
//! isolated in fewer splits, so a short mean path length means "outlier".
//!
//! Scores follow the usual convention: `score_samples` lies in [-1, 0),
//! `decision_function` subtracts the contamination percentile of the training
//! scores, and a sample is an inlier iff its decision value is >= 0.

use super::{AnomalyModel, Classification};
use crate::error::ModelError;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const AUTO_MAX_SAMPLES: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    /// Rows drawn (without replacement) per tree; None = min(256, n)
    pub max_samples: Option<usize>,
    pub contamination: f64,
    pub random_seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: None,
            contamination: 0.1,
            random_seed: 42,
        }
    }
}

impl From<&crate::config::TrainingConfig> for IsolationForestParams {
    fn from(t: &crate::config::TrainingConfig) -> Self {
        Self {
            n_estimators: t.n_estimators,
            max_samples: t.max_samples,
            contamination: t.contamination,
            random_seed: t.random_seed,
        }
    }
}

impl IsolationForestParams {
    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameter("n_estimators must be positive".into()));
        }
        if matches!(self.max_samples, Some(m) if m < 2) {
            return Err(ModelError::InvalidParameter("max_samples must be at least 2".into()));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ModelError::InvalidParameter(format!(
                "contamination {} outside (0, 0.5]",
                self.contamination
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// Flat node arena; index 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: ArrayView2<'_, f64>, rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        grow_node(&mut nodes, data, rows, 0, max_depth, rng);
        Self { nodes }
    }

    fn path_length(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { size }) => return depth + average_path_length(*size),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                None => return depth,
            }
        }
    }
}

fn grow_node(
    nodes: &mut Vec<Node>,
    data: ArrayView2<'_, f64>,
    rows: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> usize {
    let idx = nodes.len();
    nodes.push(Node::Leaf { size: rows.len() });
    if depth >= max_depth || rows.len() <= 1 {
        return idx;
    }

    // Only features that still vary inside this node can split it.
    let spans: Vec<(usize, f64, f64)> = (0..data.ncols())
        .filter_map(|f| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let x = data[[r, f]];
                (lo.min(x), hi.max(x))
            });
            (lo < hi).then_some((f, lo, hi))
        })
        .collect();
    if spans.is_empty() {
        return idx;
    }

    let (feature, lo, hi) = spans[rng.gen_range(0..spans.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| data[[r, feature]] < threshold);

    let left = grow_node(nodes, data, left_rows, depth + 1, max_depth, rng);
    let right = grow_node(nodes, data, right_rows, depth + 1, max_depth, rng);
    nodes[idx] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    idx
}

/// Expected path length of an unsuccessful BST search over `n` items.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 100].
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    params: IsolationForestParams,
    trees: Vec<IsolationTree>,
    n_features: usize,
    max_samples: usize,
    offset: f64,
}

impl IsolationForest {
    /// Negated anomaly score in [-1, 0); lower means more anomalous.
    pub fn score_samples(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mean = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        -(2f64.powf(-mean / average_path_length(self.max_samples)))
    }

    pub fn decision_function(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.score_samples(x) - self.offset
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn params(&self) -> &IsolationForestParams {
        &self.params
    }
}

impl AnomalyModel for IsolationForest {
    type Params = IsolationForestParams;

    const KIND: &'static str = "IsolationForest";

    fn fit(data: ArrayView2<'_, f64>, params: &Self::Params) -> Result<Self, ModelError> {
        params.validate()?;
        let (n, d) = data.dim();
        if n < 2 {
            return Err(ModelError::InsufficientSamples { required: 2, got: n });
        }
        if d == 0 {
            return Err(ModelError::EmptyFeatures);
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let max_samples = params.max_samples.unwrap_or(AUTO_MAX_SAMPLES).min(n);
        let max_depth = (max_samples.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.random_seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let rows = rand::seq::index::sample(&mut rng, n, max_samples).into_vec();
                IsolationTree::grow(data, rows, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            params: params.clone(),
            trees,
            n_features: d,
            max_samples,
            offset: 0.0,
        };
        let scores: Vec<f64> = data.rows().into_iter().map(|r| forest.score_samples(r)).collect();
        forest.offset = percentile(&scores, 100.0 * params.contamination);
        tracing::debug!(rows = n, cols = d, offset = forest.offset, "isolation forest fitted");
        Ok(forest)
    }

    fn classify(&self, sample: ArrayView1<'_, f64>) -> Result<Classification, ModelError> {
        if sample.len() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let score = self.decision_function(sample);
        Ok(Classification {
            inlier: score >= 0.0,
            score,
        })
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2};

    const CENTRE: [f64; 4] = [0.10, 0.15, 0.05, 0.11];

    fn cluster(rows: usize) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        Array2::from_shape_fn((rows, CENTRE.len()), |(_, c)| CENTRE[c] + rng.gen_range(-0.01..0.01))
    }

    #[test]
    fn far_sample_is_outlier_centre_is_inlier() {
        let data = cluster(60);
        let f = IsolationForest::fit(data.view(), &IsolationForestParams::default()).unwrap();
        let centre = f.classify(arr1(&CENTRE).view()).unwrap();
        let far = f.classify(arr1(&[1.5, 2.0, 3.0, 1.9]).view()).unwrap();
        assert!(centre.inlier);
        assert!(!far.inlier);
        assert!(far.score < centre.score);
    }

    #[test]
    fn same_seed_same_scores() {
        let data = cluster(30);
        let p = IsolationForestParams::default();
        let a = IsolationForest::fit(data.view(), &p).unwrap();
        let b = IsolationForest::fit(data.view(), &p).unwrap();
        let probe = arr1(&[0.12, 0.14, 0.06, 0.1]);
        assert_eq!(
            a.decision_function(probe.view()).to_bits(),
            b.decision_function(probe.view()).to_bits()
        );
    }

    #[test]
    fn json_roundtrip_scores_bit_identical() {
        let data = cluster(20);
        let f = IsolationForest::fit(data.view(), &IsolationForestParams::default()).unwrap();
        let restored: IsolationForest = serde_json::from_str(&serde_json::to_string(&f).unwrap()).unwrap();
        let probe = arr1(&[0.2, 0.1, 0.0, 0.3]);
        assert_eq!(f.classify(probe.view()), restored.classify(probe.view()));
        assert_eq!(f.offset().to_bits(), restored.offset().to_bits());
    }

    #[test]
    fn homogeneous_corpus_fits_and_accepts_itself() {
        let data = Array2::from_shape_fn((5, 3), |(_, c)| c as f64 * 0.1);
        let f = IsolationForest::fit(data.view(), &IsolationForestParams::default()).unwrap();
        let c = f.classify(data.row(0)).unwrap();
        assert!(c.inlier);
        assert_eq!(c.score, 0.0);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let f = IsolationForest::fit(cluster(10).view(), &IsolationForestParams::default()).unwrap();
        assert_eq!(
            f.classify(arr1(&[0.1, 0.2]).view()),
            Err(ModelError::DimensionMismatch { expected: 4, got: 2 })
        );
    }

    #[test]
    fn degenerate_inputs_fail_to_fit() {
        let p = IsolationForestParams::default();
        let one = Array2::<f64>::zeros((1, 3));
        assert!(matches!(
            IsolationForest::fit(one.view(), &p),
            Err(ModelError::InsufficientSamples { got: 1, .. })
        ));
        let no_cols = Array2::<f64>::zeros((4, 0));
        assert_eq!(IsolationForest::fit(no_cols.view(), &p).unwrap_err(), ModelError::EmptyFeatures);
        let mut nan = Array2::<f64>::zeros((4, 2));
        nan[[2, 1]] = f64::NAN;
        assert_eq!(IsolationForest::fit(nan.view(), &p).unwrap_err(), ModelError::NonFinite);
        let bad = IsolationForestParams {
            contamination: 0.9,
            ..p
        };
        assert!(matches!(
            IsolationForest::fit(cluster(5).view(), &bad),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn path_length_normaliser() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }

    #[test]
    fn percentile_interpolates() {
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 0.0), 1.0);
        assert!((percentile(&[4.0, 1.0, 3.0, 2.0], 10.0) - 1.3).abs() < 1e-12);
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 100.0), 4.0);
    }
}
