//! Side-effect consumers for admitted alerts.
//!
//! Delivery failures are reported back as `SinkError` and only ever logged by
//! the lifecycle manager; they never undo an admission.

use crate::core_modules::alert::{Alert, Severity};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Receives one system notification per admitted alert.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, alert: &Alert) -> Result<(), SinkError>;
}

/// Receives one audio cue request per admitted alert.
pub trait SoundSink: Send + Sync {
    fn play(&self, cue_id: &str) -> Result<(), SinkError>;
}

/// The audio cue for an alert of the given severity.
pub fn cue_for_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "alert-low",
        Severity::Medium => "alert-medium",
        Severity::High => "alert-high",
        Severity::Critical => "alert-critical",
    }
}

/// Writes notifications to the log instead of the desktop.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, alert: &Alert) -> Result<(), SinkError> {
        match alert.severity {
            Severity::High | Severity::Critical => warn!(
                alert_id = %alert.id,
                source = %alert.source_name,
                severity = %alert.severity,
                "{}",
                alert.description
            ),
            _ => info!(
                alert_id = %alert.id,
                source = %alert.source_name,
                severity = %alert.severity,
                "{}",
                alert.description
            ),
        }
        Ok(())
    }
}

/// Logs cue requests; for hosts without audio output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSoundSink;

impl SoundSink for LogSoundSink {
    fn play(&self, cue_id: &str) -> Result<(), SinkError> {
        info!(cue_id = %cue_id, "Playing alert cue");
        Ok(())
    }
}
