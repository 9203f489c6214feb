// THEORY:
// The `AlertFactory` is the only place alerts are born. It turns an ephemeral
// `MotionEvent` into a durable `Alert` record by fixing its identity, severity,
// confidence and description once and for all.
//
// Identity must be unique for the whole session even when several sources fire
// within the same millisecond, so an id combines the source, the creation time
// and a session-wide counter. The factory is shared by every source worker; the
// counter is atomic and needs no lock.

use crate::core_modules::alert::{Alert, AlertId, AlertKind, Severity};
use crate::core_modules::clock::Timestamp;
use crate::core_modules::motion_gate::MotionEvent;
use std::sync::atomic::{AtomicU64, Ordering};

pub const CONNECTION_LOST_SEVERITY: Severity = Severity::High;
pub const CONNECTION_LOST_CONFIDENCE: f64 = 100.0;

#[derive(Debug, Default)]
pub struct AlertFactory {
    counter: AtomicU64,
}

impl AlertFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a motion alert from a gated event.
    pub fn create(&self, event: &MotionEvent, source_name: &str) -> Alert {
        let intensity = event.reading.intensity;
        Alert::new(
            self.next_id(&event.source_id, event.triggered_at),
            AlertKind::Motion,
            event.source_id.clone(),
            source_name,
            event.triggered_at,
            Severity::from_intensity(intensity),
            intensity,
            describe(AlertKind::Motion, intensity),
        )
    }

    /// Builds the alert raised when a source stops delivering frames.
    pub fn create_connection_lost(&self, source_id: &str, source_name: &str, at: Timestamp) -> Alert {
        Alert::new(
            self.next_id(source_id, at),
            AlertKind::ConnectionLost,
            source_id,
            source_name,
            at,
            CONNECTION_LOST_SEVERITY,
            CONNECTION_LOST_CONFIDENCE,
            describe(AlertKind::ConnectionLost, CONNECTION_LOST_CONFIDENCE),
        )
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    fn next_id(&self, source_id: &str, at: Timestamp) -> AlertId {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        AlertId::new(format!("{}-{}-{}", source_id, at.timestamp_millis(), sequence))
    }
}

fn describe(kind: AlertKind, intensity: f64) -> String {
    match kind {
        AlertKind::Motion => format!("Motion detected ({:.0}% intensity)", intensity),
        AlertKind::ConnectionLost => "Connection lost".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::alert::AlertStatus;
    use crate::core_modules::clock::timestamp_from_millis;
    use crate::core_modules::motion_estimator::MotionReading;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn event(source_id: &str, intensity: f64, at_ms: i64) -> MotionEvent {
        let at = timestamp_from_millis(at_ms);
        MotionEvent {
            source_id: source_id.to_string(),
            reading: MotionReading {
                intensity,
                pixel_change_count: 10,
                mean_channel_delta: intensity,
                captured_at: at,
            },
            triggered_at: at,
        }
    }

    #[test]
    fn motion_alert_fields() {
        let factory = AlertFactory::new();
        let alert = factory.create(&event("CAM-1", 95.0, 3_000), "Front door");
        assert_eq!(alert.kind, AlertKind::Motion);
        assert_eq!(alert.source_id, "CAM-1");
        assert_eq!(alert.source_name, "Front door");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.confidence, 95.0);
        assert_eq!(alert.status, AlertStatus::New);
        assert_eq!(alert.created_at, timestamp_from_millis(3_000));
        assert_eq!(alert.description, "Motion detected (95% intensity)");
    }

    #[test]
    fn description_rounds_intensity() {
        let factory = AlertFactory::new();
        let alert = factory.create(&event("CAM-1", 42.6, 0), "Yard");
        assert_eq!(alert.description, "Motion detected (43% intensity)");
        assert_eq!(alert.severity, Severity::Medium);
    }

    #[test]
    fn same_millisecond_ids_stay_unique() {
        let factory = AlertFactory::new();
        let a = factory.create(&event("CAM-1", 50.0, 1_000), "a");
        let b = factory.create(&event("CAM-1", 50.0, 1_000), "a");
        let c = factory.create(&event("CAM-2", 50.0, 1_000), "b");
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(factory.issued(), 3);
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let factory = Arc::new(AlertFactory::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let factory = factory.clone();
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| factory.create(&event(&format!("CAM-{worker}"), 70.0, 0), "x").id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id));
            }
        }
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn connection_lost_alert_is_fixed_high() {
        let factory = AlertFactory::new();
        let alert = factory.create_connection_lost("CAM-9", "Garage", timestamp_from_millis(7));
        assert_eq!(alert.kind, AlertKind::ConnectionLost);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.confidence, 100.0);
        assert_eq!(alert.description, "Connection lost");
        assert!(alert.id.as_str().starts_with("CAM-9-7-"));
    }
}
