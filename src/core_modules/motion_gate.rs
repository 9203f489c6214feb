// THEORY:
// The `MotionGate` converts the continuous stream of `MotionReading`s into discrete
// `MotionEvent`s. It is a debounce, not a smoothing filter:
//
// - A single reading strictly above the threshold fires immediately, provided the
//   cooldown window has elapsed since the last event for that source.
// - Sustained motion below the threshold never fires, however long it lasts.
// - Sustained motion above the threshold fires at most once per cooldown window.
//
// The only state is `last_emitted_at` per source. The gate never guesses at
// disconnection: its owner calls `reset` when a source goes away.

use crate::core_modules::clock::Timestamp;
use crate::core_modules::motion_estimator::MotionReading;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

pub const DEFAULT_THRESHOLD: f64 = 30.0;
pub const DEFAULT_COOLDOWN_MS: u64 = 5_000;

/// A reportable motion occurrence for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub source_id: String,
    pub reading: MotionReading,
    pub triggered_at: Timestamp,
}

/// Threshold and cooldown policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSettings {
    /// Intensity a reading must strictly exceed to fire.
    pub threshold: f64,
    /// Minimum spacing between two events of the same source.
    pub cooldown_ms: u64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

#[derive(Debug, Default)]
pub struct MotionGate {
    settings: GateSettings,
    last_emitted: HashMap<String, Timestamp>,
}

impl MotionGate {
    pub fn new(settings: GateSettings) -> Self {
        Self {
            settings,
            last_emitted: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Feeds one reading; returns an event when the gate opens.
    pub fn observe(&mut self, source_id: &str, reading: MotionReading) -> Option<MotionEvent> {
        let now = reading.captured_at;

        if reading.intensity <= self.settings.threshold {
            trace!(
                source_id = %source_id,
                intensity = reading.intensity,
                threshold = self.settings.threshold,
                "Reading below threshold"
            );
            return None;
        }

        if let Some(last) = self.last_emitted.get(source_id) {
            let elapsed_ms = (now - *last).num_milliseconds();
            if elapsed_ms < 0 || (elapsed_ms as u64) < self.settings.cooldown_ms {
                trace!(
                    source_id = %source_id,
                    intensity = reading.intensity,
                    elapsed_ms,
                    cooldown_ms = self.settings.cooldown_ms,
                    "Reading suppressed by cooldown"
                );
                return None;
            }
        }

        self.last_emitted.insert(source_id.to_string(), now);
        debug!(
            source_id = %source_id,
            intensity = reading.intensity,
            changed_pixels = reading.pixel_change_count,
            "Motion event emitted"
        );

        Some(MotionEvent {
            source_id: source_id.to_string(),
            reading,
            triggered_at: now,
        })
    }

    /// Forgets the last emission for `source_id`; the next qualifying reading fires.
    pub fn reset(&mut self, source_id: &str) {
        self.last_emitted.remove(source_id);
    }

    pub fn reset_all(&mut self) {
        self.last_emitted.clear();
    }

    pub fn last_emitted_at(&self, source_id: &str) -> Option<Timestamp> {
        self.last_emitted.get(source_id).copied()
    }
}
