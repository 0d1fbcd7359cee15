//! Service configuration: JSON file, deployment profile, environment overrides.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Directory holding the encrypted store
    pub data_dir: PathBuf,
    /// Timing feature extraction bounds
    pub features: FeaturesConfig,
    /// Corpus threshold and anomaly model parameters
    pub training: TrainingConfig,
    /// In-memory model cache
    pub cache: CacheConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    Milliseconds,
    Seconds,
}

impl TimestampUnit {
    /// Divisor turning a raw timestamp delta into seconds.
    pub fn per_second(self) -> f64 {
        match self {
            TimestampUnit::Milliseconds => 1000.0,
            TimestampUnit::Seconds => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Upper bound for an accepted hold time (seconds)
    pub max_hold_time: f64,
    /// Upper bound for an accepted keyup-keydown time (seconds)
    pub max_flight_time: f64,
    /// Keydown-keydown times must exceed this (seconds)
    pub min_timing: f64,
    /// Longer samples are truncated to this many events
    pub max_events: usize,
    pub timestamp_unit: TimestampUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Corpus size at which a model is (re)trained
    pub min_samples: usize,
    /// Expected outlier fraction, in (0, 0.5]
    pub contamination: f64,
    /// Ensemble size
    pub n_estimators: usize,
    /// Rows per tree; None means min(256, corpus size)
    pub max_samples: Option<usize>,
    pub random_seed: u64,
    /// Value used to right-pad short feature vectors
    pub padding_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
    /// Emit one NDJSON audit line per authentication decision
    pub audit: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            features: FeaturesConfig::default(),
            training: TrainingConfig::default(),
            cache: CacheConfig::default(),
            log: LogConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("keystroke-auth"))
        .unwrap_or_else(|| PathBuf::from(".keystroke-auth"))
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            max_hold_time: 5.0,
            max_flight_time: 10.0,
            min_timing: 0.001,
            max_events: 1000,
            timestamp_unit: TimestampUnit::Milliseconds,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            contamination: 0.1,
            n_estimators: 100,
            max_samples: None,
            random_seed: 42,
            padding_value: 0.0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
            audit: false,
        }
    }
}

/// Deployment profile; selects a preset before file and env overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
    Testing,
}

impl Profile {
    /// `KEYSTROKE_ENV`; unknown or unset means development.
    pub fn from_env() -> Self {
        std::env::var("KEYSTROKE_ENV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Profile::Development)
    }
}

impl FromStr for Profile {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "default" => Ok(Profile::Development),
            "production" => Ok(Profile::Production),
            "testing" => Ok(Profile::Testing),
            other => Err(AuthError::Config(format!("unknown profile {other:?}"))),
        }
    }
}

impl AuthConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<AuthConfig>(&data) {
                    Ok(c) => return c,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "config unparseable; using defaults")
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "config unreadable; using defaults")
                }
            }
        }
        Self::default()
    }

    pub fn for_profile(profile: Profile) -> Self {
        let mut c = Self::default();
        match profile {
            Profile::Development => {
                c.log.level = "debug".to_string();
                c.log.json = false;
            }
            Profile::Production => {
                c.log.level = "warn".to_string();
            }
            Profile::Testing => {
                c.data_dir = PathBuf::from("test_models");
                c.training.min_samples = 2;
            }
        }
        c
    }

    /// Apply `KEYSTROKE_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("KEYSTROKE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        override_parsed(&lookup, "KEYSTROKE_MIN_SAMPLES", &mut self.training.min_samples);
        override_parsed(&lookup, "KEYSTROKE_CONTAMINATION", &mut self.training.contamination);
        override_parsed(&lookup, "KEYSTROKE_RANDOM_SEED", &mut self.training.random_seed);
        override_parsed(&lookup, "KEYSTROKE_MAX_EVENTS", &mut self.features.max_events);
        override_parsed(&lookup, "KEYSTROKE_MODEL_CACHE", &mut self.cache.enabled);
        if let Some(level) = lookup("KEYSTROKE_LOG_LEVEL") {
            self.log.level = level.to_ascii_lowercase();
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        let t = &self.training;
        let f = &self.features;
        if t.min_samples < 2 {
            return Err(AuthError::Config("training.min_samples must be at least 2".into()));
        }
        if !(t.contamination > 0.0 && t.contamination <= 0.5) {
            return Err(AuthError::Config("training.contamination must be in (0, 0.5]".into()));
        }
        if t.n_estimators == 0 {
            return Err(AuthError::Config("training.n_estimators must be positive".into()));
        }
        if matches!(t.max_samples, Some(m) if m < 2) {
            return Err(AuthError::Config("training.max_samples must be at least 2".into()));
        }
        if !t.padding_value.is_finite() {
            return Err(AuthError::Config("training.padding_value must be finite".into()));
        }
        if !(f.max_hold_time > 0.0 && f.max_flight_time > 0.0 && f.min_timing >= 0.0) {
            return Err(AuthError::Config("feature timing bounds must be positive".into()));
        }
        if f.max_events < 2 {
            return Err(AuthError::Config("features.max_events must be at least 2".into()));
        }
        Ok(())
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) {
    let Some(raw) = lookup(name) else { return };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(var = name, value = %raw, "ignoring unparseable override"),
    }
}
