// THEORY:
// The `AlertLifecycleManager` is the single owner of every alert in a monitoring
// session. Producers (the source workers) hand it freshly created alerts;
// consumers (the dashboard, the notification and sound sinks) read from it or
// subscribe to it. Nothing else may touch an alert's status.
//
// Key architectural principles:
// 1.  **One Lock, One Truth**: The registry is the only shared mutable state in the
//     pipeline. Insertion and the id-uniqueness check happen under the same mutex,
//     so concurrent admission from many sources can never create duplicates.
// 2.  **Idempotent Admission**: Upstream retries may deliver the same alert twice.
//     A second admission of a known id is a silent success with no side effects.
// 3.  **Guarded Transitions**: Every status change is checked twice, first against
//     the external authorizer and then against the state machine, before it is
//     applied and written to the alert's history. A refused change leaves the
//     registry untouched.
// 4.  **Events Inside, Side Effects Outside**: Subscriber events are published
//     while the registry lock is held, so every subscriber sees an alert's
//     admission and status changes in the order they were applied. Notifications
//     and sound cues run after the lock is released. A failing or panicking sink
//     is logged and counted; it never rolls back an admission.

use crate::core_modules::alert::{Alert, AlertAction, AlertId, AlertStatus, Severity};
use crate::core_modules::authorization::{Actor, Authorizer, RoleAuthorizer};
use crate::core_modules::clock::{Clock, SystemClock};
use crate::core_modules::sinks::{NotificationSink, SinkError, SoundSink, cue_for_severity};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Alert {0} not found")]
    NotFound(AlertId),

    #[error("Actor {actor} is not permitted to {action} alerts")]
    PermissionDenied { actor: String, action: AlertAction },

    #[error("Alert {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: AlertId,
        from: AlertStatus,
        to: AlertStatus,
    },
}

/// Outcome of `admit`. Both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate,
}

/// Notifications published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Admitted(Alert),
    Changed { alert: Alert, previous: AlertStatus },
}

/// Per-id result of a bulk transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub id: AlertId,
    pub result: Result<Alert, TransitionError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new: usize,
    pub acknowledged: usize,
    pub investigating: usize,
    pub dismissed: usize,
}

impl StatusCounts {
    pub fn get(&self, status: AlertStatus) -> usize {
        match status {
            AlertStatus::New => self.new,
            AlertStatus::Acknowledged => self.acknowledged,
            AlertStatus::Investigating => self.investigating,
            AlertStatus::Dismissed => self.dismissed,
        }
    }

    pub fn total(&self) -> usize {
        self.new + self.acknowledged + self.investigating + self.dismissed
    }

    fn bump(&mut self, status: AlertStatus) {
        match status {
            AlertStatus::New => self.new += 1,
            AlertStatus::Acknowledged => self.acknowledged += 1,
            AlertStatus::Investigating => self.investigating += 1,
            AlertStatus::Dismissed => self.dismissed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }
}

/// Side-effect delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub cues_played: u64,
    pub cue_failures: u64,
}

/// Read-only filter over the registry. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
    pub source_id: Option<String>,
    /// Case-insensitive substring of the description.
    pub text: Option<String>,
}

impl AlertFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: AlertStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if self.status.is_some_and(|status| alert.status != status) {
            return false;
        }
        if self.severity.is_some_and(|severity| alert.severity != severity) {
            return false;
        }
        if let Some(source_id) = &self.source_id {
            if &alert.source_id != source_id {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !alert.description.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Runtime toggles and channel sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
    pub event_channel_capacity: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notifications_enabled: true,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Alerts in admission order plus an id index.
#[derive(Debug, Default)]
struct Registry {
    alerts: Vec<Alert>,
    index: HashMap<AlertId, usize>,
}

impl Registry {
    fn get_mut(&mut self, id: &AlertId) -> Option<&mut Alert> {
        let position = *self.index.get(id)?;
        self.alerts.get_mut(position)
    }
}

pub struct AlertLifecycleManager {
    registry: Mutex<Registry>,
    authorizer: Arc<dyn Authorizer>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    sound_sink: Option<Arc<dyn SoundSink>>,
    clock: Arc<dyn Clock>,
    sound_enabled: AtomicBool,
    notifications_enabled: AtomicBool,
    events: broadcast::Sender<AlertEvent>,
    stats: Mutex<DeliveryStats>,
}

impl AlertLifecycleManager {
    /// A manager with the default role authorizer, the system clock and no sinks.
    pub fn new(settings: ManagerSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_channel_capacity.max(1));
        Self {
            registry: Mutex::new(Registry::default()),
            authorizer: Arc::new(RoleAuthorizer::with_defaults()),
            notification_sink: None,
            sound_sink: None,
            clock: Arc::new(SystemClock),
            sound_enabled: AtomicBool::new(settings.sound_enabled),
            notifications_enabled: AtomicBool::new(settings.notifications_enabled),
            events,
            stats: Mutex::new(DeliveryStats::default()),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn with_sound_sink(mut self, sink: Arc<dyn SoundSink>) -> Self {
        self.sound_sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Subscribes to admissions and status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.events.subscribe()
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.sound_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Alert sound toggled");
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.notifications_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Alert notifications toggled");
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled.load(Ordering::SeqCst)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::SeqCst)
    }

    pub fn delivery_stats(&self) -> DeliveryStats {
        *self.stats.lock()
    }

    /// Inserts `alert` and fires its side effects once. Known ids are ignored.
    pub fn admit(&self, alert: Alert) -> Admission {
        {
            let mut registry = self.registry.lock();
            if registry.index.contains_key(&alert.id) {
                debug!(alert_id = %alert.id, "Duplicate admission ignored");
                return Admission::Duplicate;
            }
            let position = registry.alerts.len();
            registry.index.insert(alert.id.clone(), position);
            registry.alerts.push(alert.clone());
            // No subscribers is fine.
            let _ = self.events.send(AlertEvent::Admitted(alert.clone()));
        }

        info!(
            alert_id = %alert.id,
            source_id = %alert.source_id,
            kind = ?alert.kind,
            severity = %alert.severity,
            confidence = alert.confidence,
            "Alert admitted"
        );

        self.dispatch_side_effects(&alert);

        Admission::Admitted
    }

    /// Moves one alert to `target` on behalf of `actor`.
    pub fn transition(
        &self,
        id: &AlertId,
        target: AlertStatus,
        actor: &Actor,
    ) -> Result<Alert, TransitionError> {
        let action = AlertAction::for_target(target);

        if let Some(action) = action {
            if action.requires_permission() && !self.authorizer.is_permitted(actor, action) {
                warn!(
                    alert_id = %id,
                    actor = %actor.id,
                    role = %actor.role,
                    action = %action,
                    "Transition refused: permission denied"
                );
                return Err(TransitionError::PermissionDenied {
                    actor: actor.id.clone(),
                    action,
                });
            }
        }

        let (updated, previous) = {
            let mut registry = self.registry.lock();
            let alert = registry
                .get_mut(id)
                .ok_or_else(|| TransitionError::NotFound(id.clone()))?;
            let previous = alert.status;

            if action.is_none() || !previous.can_transition_to(target) {
                warn!(
                    alert_id = %id,
                    from = %previous,
                    to = %target,
                    "Transition refused: not allowed by state machine"
                );
                return Err(TransitionError::InvalidTransition {
                    id: id.clone(),
                    from: previous,
                    to: target,
                });
            }

            alert.apply_status(target, self.clock.now());
            let updated = alert.clone();
            let _ = self.events.send(AlertEvent::Changed {
                alert: updated.clone(),
                previous,
            });
            (updated, previous)
        };

        info!(
            alert_id = %id,
            actor = %actor.id,
            from = %previous,
            to = %target,
            "Alert status changed"
        );

        Ok(updated)
    }

    /// Applies `transition` to every id independently.
    pub fn bulk_transition(
        &self,
        ids: &[AlertId],
        target: AlertStatus,
        actor: &Actor,
    ) -> Vec<TransitionOutcome> {
        let outcomes: Vec<TransitionOutcome> = ids
            .iter()
            .map(|id| TransitionOutcome {
                id: id.clone(),
                result: self.transition(id, target, actor),
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            requested = ids.len(),
            failed,
            to = %target,
            "Bulk transition finished"
        );
        outcomes
    }

    /// Dismisses every non-terminal alert. Records are kept. Returns how many changed.
    pub fn clear_all(&self) -> usize {
        let now = self.clock.now();
        let dismissed = {
            let mut registry = self.registry.lock();
            let mut dismissed = 0;
            for alert in registry.alerts.iter_mut().filter(|alert| alert.is_active()) {
                let previous = alert.status;
                alert.apply_status(AlertStatus::Dismissed, now);
                let _ = self.events.send(AlertEvent::Changed {
                    alert: alert.clone(),
                    previous,
                });
                dismissed += 1;
            }
            dismissed
        };

        info!(dismissed, "All active alerts cleared");
        dismissed
    }

    pub fn get(&self, id: &AlertId) -> Option<Alert> {
        let registry = self.registry.lock();
        let position = *registry.index.get(id)?;
        registry.alerts.get(position).cloned()
    }

    /// Every alert, most recent first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.registry.lock().alerts.iter().rev().cloned().collect()
    }

    /// Alerts matching `filter`, most recent first.
    pub fn query(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.registry
            .lock()
            .alerts
            .iter()
            .rev()
            .filter(|alert| filter.matches(alert))
            .cloned()
            .collect()
    }

    pub fn counts_by_status(&self) -> StatusCounts {
        let registry = self.registry.lock();
        let mut counts = StatusCounts::default();
        for alert in &registry.alerts {
            counts.bump(alert.status);
        }
        counts
    }

    pub fn counts_by_severity(&self) -> SeverityCounts {
        let registry = self.registry.lock();
        let mut counts = SeverityCounts::default();
        for alert in &registry.alerts {
            counts.bump(alert.severity);
        }
        counts
    }

    /// Alerts not yet dismissed.
    pub fn active_count(&self) -> usize {
        self.registry
            .lock()
            .alerts
            .iter()
            .filter(|alert| alert.is_active())
            .count()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dispatch_side_effects(&self, alert: &Alert) {
        if self.notifications_enabled() {
            if let Some(sink) = &self.notification_sink {
                match deliver(|| sink.notify(alert)) {
                    Ok(()) => self.stats.lock().notifications_sent += 1,
                    Err(e) => {
                        self.stats.lock().notification_failures += 1;
                        warn!(alert_id = %alert.id, error = %e, "Notification delivery failed");
                    }
                }
            }
        }

        if self.sound_enabled() {
            if let Some(sink) = &self.sound_sink {
                let cue_id = cue_for_severity(alert.severity);
                match deliver(|| sink.play(cue_id)) {
                    Ok(()) => self.stats.lock().cues_played += 1,
                    Err(e) => {
                        self.stats.lock().cue_failures += 1;
                        warn!(alert_id = %alert.id, cue_id, error = %e, "Sound cue delivery failed");
                    }
                }
            }
        }
    }
}

/// Runs one sink call, turning a panic into a delivery failure.
fn deliver<F>(call: F) -> Result<(), SinkError>
where
    F: FnOnce() -> Result<(), SinkError>,
{
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(SinkError::DeliveryFailed(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("sink panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("sink panicked: {message}")
    } else {
        "sink panicked".to_string()
    }
}

impl Default for AlertLifecycleManager {
    fn default() -> Self {
        Self::new(ManagerSettings::default())
    }
}
