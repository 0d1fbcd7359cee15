//! Anomaly detection models fit on a user's padded feature matrix.
//!
//! The pipeline only depends on [`AnomalyModel`]; [`IsolationForest`] is the
//! detector used by default.

mod isolation_forest;

pub use isolation_forest::{IsolationForest, IsolationForestParams};

use crate::error::ModelError;
use chrono::{DateTime, Utc};
use ndarray::{ArrayView1, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Binary label plus the detector's raw score (higher = more inlier-like).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub inlier: bool,
    pub score: f64,
}

/// Capability set of an unsupervised detector: fit once, then score samples.
pub trait AnomalyModel: Serialize + DeserializeOwned + Send + Sync + Sized {
    type Params: Clone + Serialize + Send + Sync;

    /// Recorded in model metadata.
    const KIND: &'static str;

    fn fit(data: ArrayView2<'_, f64>, params: &Self::Params) -> Result<Self, ModelError>;

    /// `sample` must have exactly [`AnomalyModel::n_features`] values.
    fn classify(&self, sample: ArrayView1<'_, f64>) -> Result<Classification, ModelError>;

    fn n_features(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: Uuid,
    pub user_id: String,
    pub model_type: String,
    pub version: String,
    pub feature_extraction_method: String,
    /// Column count at fit time; every scored vector is reconciled to it
    pub expected_vector_length: usize,
    pub sample_count: usize,
    pub training_parameters: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the serialized model blob
    pub blob_sha256: String,
}

/// A fitted model and the metadata needed to score against it.
#[derive(Debug, Clone)]
pub struct TrainedModel<M> {
    pub model: M,
    pub metadata: ModelMetadata,
}

impl<M: AnomalyModel> TrainedModel<M> {
    pub fn expected_vector_length(&self) -> usize {
        self.metadata.expected_vector_length
    }
}
