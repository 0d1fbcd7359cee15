//! Error taxonomy. Extraction and decision errors are deterministic; only
//! persistence failures are worth retrying.

use thiserror::Error;

/// Failures of the encrypted local store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("crypto: {0}")]
    Crypto(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of fitting or scoring an anomaly model.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("need at least {required} samples to fit, got {got}")]
    InsufficientSamples { required: usize, got: usize },

    #[error("training matrix has no feature columns")]
    EmptyFeatures,

    #[error("training matrix contains non-finite values")]
    NonFinite,

    #[error("invalid model parameter: {0}")]
    InvalidParameter(String),

    #[error("sample has {got} features, model expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Errors surfaced by the authentication pipeline.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("Unable to extract features from keystroke data")]
    FeatureExtraction,

    #[error("User model not found for {user_id}. Please train the model first.")]
    ModelNotFound { user_id: String },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Failed to train the model: {0}")]
    Training(#[from] ModelError),

    #[error("Failed to score keystroke sample: {0}")]
    Scoring(ModelError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Stable machine-readable code for responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::FeatureExtraction => "feature_extraction_error",
            AuthError::ModelNotFound { .. } => "model_not_found",
            AuthError::Persistence(_) => "persistence_error",
            AuthError::Training(_) => "training_failure",
            AuthError::Scoring(_) => "scoring_failure",
            AuthError::Config(_) => "config_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Persistence(_))
    }
}
