//! Genuine/impostor verdict from a trained model and a fresh feature vector.

use crate::error::AuthError;
use crate::features::{reconcile, FeatureVector};
use crate::model::{AnomalyModel, TrainedModel};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

pub const ANOMALY_REASON: &str = "Typing pattern anomaly detected";

/// Model label plus its raw score, surfaced unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub genuine: bool,
    pub score: f64,
}

impl Verdict {
    pub fn reason(&self) -> Option<&'static str> {
        (!self.genuine).then_some(ANOMALY_REASON)
    }
}

pub struct DecisionEngine {
    padding_value: f64,
}

impl DecisionEngine {
    pub fn new(padding_value: f64) -> Self {
        Self { padding_value }
    }

    /// Pad or truncate `fresh` to the model's width, then classify.
    /// No scaling or secondary threshold is applied.
    pub fn decide<M: AnomalyModel>(&self, trained: &TrainedModel<M>, fresh: &FeatureVector) -> Result<Verdict, AuthError> {
        let sample = reconcile(fresh.as_slice(), trained.expected_vector_length(), self.padding_value);
        let c = trained
            .model
            .classify(ArrayView1::from(sample.as_slice()))
            .map_err(AuthError::Scoring)?;
        Ok(Verdict {
            genuine: c.inlier,
            score: c.score,
        })
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(0.0)
    }
}
