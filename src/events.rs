//! Keystroke events and the request/response shapes exchanged with callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Down,
    Up,
}

/// One key press or release, as typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeEvent {
    pub key: String,
    #[serde(rename = "event", alias = "eventType", alias = "event_type")]
    pub action: KeyAction,
    /// Raw timestamp, milliseconds unless configured otherwise
    pub timestamp: i64,
}

impl KeystrokeEvent {
    pub fn new(key: impl Into<String>, action: KeyAction, timestamp: i64) -> Self {
        Self {
            key: key.into(),
            action,
            timestamp,
        }
    }

    pub fn down(key: impl Into<String>, timestamp: i64) -> Self {
        Self::new(key, KeyAction::Down, timestamp)
    }

    pub fn up(key: impl Into<String>, timestamp: i64) -> Self {
        Self::new(key, KeyAction::Up, timestamp)
    }

    pub fn is_down(&self) -> bool {
        self.action == KeyAction::Down
    }
}

/// Body of both train and authenticate requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystrokeRequest {
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(alias = "keystroke_data")]
    pub events: Vec<KeystrokeEvent>,
}

impl KeystrokeRequest {
    pub fn new(user_id: impl Into<String>, events: Vec<KeystrokeEvent>) -> Self {
        Self {
            user_id: user_id.into(),
            events,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainResponse {
    pub status: String,
    pub trained: bool,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub genuine: bool,
    pub score: f64,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub training_samples: usize,
    pub has_trained_model: bool,
    pub min_samples_required: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_vector_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}
