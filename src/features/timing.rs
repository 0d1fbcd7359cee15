//! Timing extraction: events → hold / keydown-keydown / keyup-keydown times.

use super::FeatureVector;
use crate::config::FeaturesConfig;
use crate::events::{KeyAction, KeystrokeEvent};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Most recent press and release seen for a key within the sample.
#[derive(Debug, Clone, Copy, Default)]
struct KeyTimes {
    down: Option<i64>,
    up: Option<i64>,
}

impl KeyTimes {
    /// `None` when either side is missing or the difference overflows.
    fn hold(&self) -> Option<i64> {
        self.up?.checked_sub(self.down?)
    }
}

pub struct TimingExtractor {
    config: FeaturesConfig,
}

impl TimingExtractor {
    pub fn new(config: FeaturesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeaturesConfig {
        &self.config
    }

    /// Extract timing features. Fewer than two events yields an empty vector;
    /// out-of-bound measurements are dropped, never clamped.
    pub fn extract(&self, events: &[KeystrokeEvent]) -> FeatureVector {
        let mut out = FeatureVector::default();
        if events.len() < 2 {
            debug!(count = events.len(), "need at least 2 keystroke events");
            return out;
        }
        let events = if events.len() > self.config.max_events {
            warn!(
                count = events.len(),
                max = self.config.max_events,
                "too many keystroke events; truncating"
            );
            &events[..self.config.max_events]
        } else {
            events
        };

        let mut keys: HashMap<&str, KeyTimes> = HashMap::new();
        for e in events {
            let t = keys.entry(e.key.as_str()).or_default();
            match e.action {
                KeyAction::Down => t.down = Some(e.timestamp),
                KeyAction::Up => t.up = Some(e.timestamp),
            }
        }

        let mut i = 0;
        while i + 1 < events.len() {
            let current = &events[i];
            let Some(offset) = events[i + 1..].iter().position(KeystrokeEvent::is_down) else {
                break;
            };
            let next_idx = i + 1 + offset;
            let next = &events[next_idx];
            let times = keys.get(current.key.as_str()).copied().unwrap_or_default();

            if let Some(hold) = times.hold() {
                self.push_hold(&mut out, hold, &current.key);
            }

            if current.is_down() {
                match next.timestamp.checked_sub(current.timestamp).map(|d| self.seconds(d)) {
                    Some(dd) if dd > self.config.min_timing => out.push(dd),
                    dd => debug!(?dd, key = %current.key, "keydown interval out of bounds; dropped"),
                }
            }

            if let Some(up) = times.up {
                let flight = next.timestamp.checked_sub(up).map(|d| self.seconds(d));
                if let Some(flight) = flight.filter(|f| *f > 0.0 && *f <= self.config.max_flight_time) {
                    out.push(flight);
                } else {
                    debug!(?flight, key = %current.key, "flight time out of bounds; dropped");
                }
            }

            i = next_idx;
        }

        if let Some(last) = events.last() {
            if let Some(hold) = keys.get(last.key.as_str()).and_then(KeyTimes::hold) {
                self.push_hold(&mut out, hold, &last.key);
            }
        }

        debug!(features = out.len(), events = events.len(), "extracted timing features");
        out
    }

    fn push_hold(&self, out: &mut FeatureVector, raw: i64, key: &str) {
        let hold = self.seconds(raw);
        if hold > 0.0 && hold <= self.config.max_hold_time {
            out.push(hold);
        } else {
            debug!(hold, key, "hold time out of bounds; dropped");
        }
    }

    fn seconds(&self, delta: i64) -> f64 {
        delta as f64 / self.config.timestamp_unit.per_second()
    }
}

impl Default for TimingExtractor {
    fn default() -> Self {
        Self::new(FeaturesConfig::default())
    }
}
