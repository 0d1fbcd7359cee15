//! Fits a fresh model on a user's whole corpus once it is large enough.

use crate::error::ModelError;
use crate::features::{pad_matrix, FeatureVector};
use crate::model::{AnomalyModel, ModelMetadata, TrainedModel};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

const MODEL_VERSION: &str = "1.0";
const FEATURE_METHOD: &str = "keystroke_dynamics";

pub struct ModelTrainer<M: AnomalyModel> {
    params: M::Params,
    min_samples: usize,
    padding_value: f64,
}

impl<M: AnomalyModel> ModelTrainer<M> {
    pub fn new(params: M::Params, min_samples: usize, padding_value: f64) -> Self {
        Self {
            params,
            min_samples,
            padding_value,
        }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// `Ok(None)` below the sample threshold. Otherwise the corpus is padded
    /// to its longest vector and a new model replaces whatever came before.
    pub fn maybe_train(
        &self,
        user_id: &str,
        corpus: &[FeatureVector],
    ) -> Result<Option<TrainedModel<M>>, ModelError> {
        if corpus.len() < self.min_samples {
            info!(
                user_id,
                samples = corpus.len(),
                required = self.min_samples,
                "not enough samples to train"
            );
            return Ok(None);
        }

        let training_parameters = serde_json::to_value(&self.params)
            .map_err(|e| ModelError::InvalidParameter(format!("training parameters not serializable: {e}")))?;
        let matrix = pad_matrix(corpus, self.padding_value);
        let model = M::fit(matrix.view(), &self.params)?;
        let expected_vector_length = matrix.ncols();
        info!(
            user_id,
            samples = corpus.len(),
            expected_vector_length,
            "trained model"
        );

        Ok(Some(TrainedModel {
            model,
            metadata: ModelMetadata {
                model_id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                model_type: M::KIND.to_string(),
                version: MODEL_VERSION.to_string(),
                feature_extraction_method: FEATURE_METHOD.to_string(),
                expected_vector_length,
                sample_count: corpus.len(),
                training_parameters,
                created_at: Utc::now(),
                blob_sha256: String::new(),
            },
        }))
    }
}
