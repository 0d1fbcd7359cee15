//! Keystroke-dynamics authentication backend.
//!
//! Modular structure:
//! - [`features`]: Timing feature extraction from key press/release events
//! - [`storage`]: Encrypted per-user corpora and models, model cache
//! - [`training`]: Threshold-triggered model fitting on padded corpora
//! - [`model`]: Anomaly detector capability trait and isolation forest
//! - [`decision`]: Genuine/impostor verdicts
//! - [`service`]: Train / authenticate orchestration
//! - [`logging`]: Structured JSON logging

pub mod config;
pub mod decision;
pub mod error;
pub mod events;
pub mod features;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;
pub mod training;

pub use config::AuthConfig;
pub use decision::{DecisionEngine, Verdict};
pub use error::{AuthError, ModelError, StoreError};
pub use events::{KeyAction, KeystrokeEvent, KeystrokeRequest};
pub use features::{FeatureVector, TimingExtractor};
pub use logging::StructuredLogger;
pub use model::{AnomalyModel, IsolationForest, TrainedModel};
pub use service::AuthService;
pub use storage::{ModelCache, SampleStore, SecureStore};
pub use training::ModelTrainer;
