//! Train / authenticate orchestration over the extractor, stores, trainer and
//! decision engine. One instance per process, shared behind an `Arc`.

use crate::config::AuthConfig;
use crate::decision::{DecisionEngine, Verdict};
use crate::error::AuthError;
use crate::events::{AuthResponse, HealthStatus, KeystrokeRequest, TrainResponse, UserInfo};
use crate::features::{FeatureVector, TimingExtractor};
use crate::model::{AnomalyModel, IsolationForest, IsolationForestParams, TrainedModel};
use crate::storage::{ModelCache, ModelStore, SampleStore, SecureStore, UserLocks};
use crate::training::ModelTrainer;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "Keystroke Dynamics Authentication API";
const TRAINING_STATUS: &str = "Training data received";
const DB_FILE: &str = "keystroke.db";

pub struct AuthService<M: AnomalyModel = IsolationForest> {
    config: AuthConfig,
    extractor: TimingExtractor,
    samples: SampleStore,
    models: ModelCache<M>,
    trainer: ModelTrainer<M>,
    decision: DecisionEngine,
    train_locks: UserLocks,
}

impl AuthService<IsolationForest> {
    /// Open the store under `config.data_dir` and wire the default detector.
    pub fn open(config: AuthConfig, secret: &[u8]) -> Result<Self, AuthError> {
        config.validate()?;
        let store = SecureStore::open(&config.data_dir.join(DB_FILE), secret)?;
        let params = IsolationForestParams::from(&config.training);
        Ok(Self::with_store(config, Arc::new(store), params))
    }
}

impl<M: AnomalyModel> AuthService<M> {
    pub fn with_store(config: AuthConfig, store: Arc<SecureStore>, params: M::Params) -> Self {
        let training = &config.training;
        Self {
            extractor: TimingExtractor::new(config.features.clone()),
            samples: SampleStore::new(Arc::clone(&store)),
            models: ModelCache::new(ModelStore::new(store), config.cache.enabled),
            trainer: ModelTrainer::new(params, training.min_samples, training.padding_value),
            decision: DecisionEngine::new(training.padding_value),
            train_locks: UserLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Extract, append to the corpus, and retrain once the threshold is met.
    /// The corpus keeps the new sample even if fitting fails.
    pub fn train(&self, req: &KeystrokeRequest) -> Result<TrainResponse, AuthError> {
        validate(req)?;
        info!(user_id = %req.user_id, events = req.events.len(), "training request");
        let features = self.extract(req)?;

        self.train_locks.with_user(&req.user_id, || -> Result<TrainResponse, AuthError> {
            let corpus = self.samples.append(&req.user_id, features)?;
            let sample_count = corpus.len();
            match self.trainer.maybe_train(&req.user_id, &corpus) {
                Ok(Some(trained)) => {
                    self.models.save(trained)?;
                    Ok(TrainResponse {
                        status: TRAINING_STATUS.to_string(),
                        trained: true,
                        sample_count,
                        message: None,
                    })
                }
                Ok(None) => Ok(TrainResponse {
                    status: TRAINING_STATUS.to_string(),
                    trained: false,
                    sample_count,
                    message: Some(format!("Need {} samples to train model", self.trainer.min_samples())),
                }),
                Err(e) => {
                    warn!(user_id = %req.user_id, error = %e, "model training failed");
                    Err(AuthError::Training(e))
                }
            }
        })
    }

    /// Score a fresh sample against the user's model.
    pub fn authenticate(&self, req: &KeystrokeRequest) -> Result<AuthResponse, AuthError> {
        let (verdict, _) = self.authenticate_detailed(req)?;
        Ok(AuthResponse {
            genuine: verdict.genuine,
            score: verdict.score,
            user_id: req.user_id.clone(),
            reason: verdict.reason().map(str::to_string),
        })
    }

    /// Like [`AuthService::authenticate`], also returning the extracted
    /// features and the model used, for auditing.
    pub fn authenticate_detailed(
        &self,
        req: &KeystrokeRequest,
    ) -> Result<(Verdict, Scored<M>), AuthError> {
        validate(req)?;
        info!(user_id = %req.user_id, events = req.events.len(), "authentication request");
        let model = self.models.load(&req.user_id)?.ok_or_else(|| AuthError::ModelNotFound {
            user_id: req.user_id.clone(),
        })?;
        let features = self.extract(req)?;
        let verdict = self.decision.decide(&model, &features)?;
        info!(
            user_id = %req.user_id,
            genuine = verdict.genuine,
            score = verdict.score,
            "authentication decision"
        );
        Ok((verdict, Scored { model, features }))
    }

    pub fn user_info(&self, user_id: &str) -> Result<UserInfo, AuthError> {
        let training_samples = self.samples.count(user_id)?;
        let model = self.models.load(user_id)?;
        Ok(UserInfo {
            user_id: user_id.to_string(),
            training_samples,
            has_trained_model: model.is_some(),
            min_samples_required: self.trainer.min_samples(),
            expected_vector_length: model.map(|m| m.expected_vector_length()),
        })
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn extract(&self, req: &KeystrokeRequest) -> Result<FeatureVector, AuthError> {
        let features = self.extractor.extract(&req.events);
        if features.is_empty() {
            warn!(user_id = %req.user_id, events = req.events.len(), "no usable timing features");
            return Err(AuthError::FeatureExtraction);
        }
        Ok(features)
    }
}

/// What an authentication was scored with.
pub struct Scored<M> {
    pub model: Arc<TrainedModel<M>>,
    pub features: FeatureVector,
}

fn validate(req: &KeystrokeRequest) -> Result<(), AuthError> {
    if req.user_id.trim().is_empty() {
        return Err(AuthError::Validation("userId must be a non-empty string".into()));
    }
    if req.events.is_empty() {
        return Err(AuthError::Validation("events must be a non-empty list".into()));
    }
    if req.events.iter().any(|e| e.key.is_empty()) {
        return Err(AuthError::Validation("every event needs a key".into()));
    }
    Ok(())
}
