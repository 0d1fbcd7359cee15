//! Timing feature extraction from raw keystroke events.

mod padding;
mod timing;

pub use padding::{pad_matrix, reconcile};
pub use timing::TimingExtractor;

use serde::{Deserialize, Serialize};

/// Timing measurements in seconds, in extraction order. Length varies per sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }

    pub(crate) fn push(&mut self, value: f64) {
        self.values.push(value);
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}
