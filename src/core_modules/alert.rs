// THEORY:
// The `Alert` is the one durable entity of the pipeline. Everything upstream
// (frames, readings, events) is ephemeral; an alert, once admitted, lives in the
// registry for the rest of the monitoring session and can only move forward
// along its status state machine.
//
//   new ──acknowledge──> acknowledged ──investigate──> investigating ──dismiss──> dismissed
//   new ──investigate──> investigating
//   new ──dismiss──> dismissed
//   acknowledged ──dismiss──> dismissed
//
// `dismissed` is terminal. Every field except `status` and `status_history` is
// fixed at creation.

use crate::core_modules::clock::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, session-unique alert identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(String);

impl AlertId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlertId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What produced the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Motion,
    ConnectionLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Maps a motion intensity onto a severity.
    ///
    /// `> 80` critical, `(60, 80]` high, `(30, 60]` medium, `<= 30` low.
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity > 80.0 {
            Severity::Critical
        } else if intensity > 60.0 {
            Severity::High
        } else if intensity > 30.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Investigating,
    Dismissed,
}

impl AlertStatus {
    pub const ALL: [AlertStatus; 4] = [
        AlertStatus::New,
        AlertStatus::Acknowledged,
        AlertStatus::Investigating,
        AlertStatus::Dismissed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Dismissed)
    }

    /// Whether the state machine has an edge from `self` to `target`.
    pub fn can_transition_to(&self, target: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!(
            (*self, target),
            (New, Acknowledged)
                | (New, Investigating)
                | (New, Dismissed)
                | (Acknowledged, Investigating)
                | (Acknowledged, Dismissed)
                | (Investigating, Dismissed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operator action that moves an alert into a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    Acknowledge,
    Investigate,
    Dismiss,
}

impl AlertAction {
    /// The action that targets `status`; `None` for `new`, which nothing returns to.
    pub fn for_target(status: AlertStatus) -> Option<Self> {
        match status {
            AlertStatus::New => None,
            AlertStatus::Acknowledged => Some(AlertAction::Acknowledge),
            AlertStatus::Investigating => Some(AlertAction::Investigate),
            AlertStatus::Dismissed => Some(AlertAction::Dismiss),
        }
    }

    /// Acknowledging and dismissing need an explicit grant; investigating does not.
    pub fn requires_permission(&self) -> bool {
        !matches!(self, AlertAction::Investigate)
    }
}

impl fmt::Display for AlertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertAction::Acknowledge => "acknowledge",
            AlertAction::Investigate => "investigate",
            AlertAction::Dismiss => "dismiss",
        };
        f.write_str(name)
    }
}

/// One entry of an alert's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: AlertStatus,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub source_id: String,
    pub source_name: String,
    pub created_at: Timestamp,
    pub severity: Severity,
    /// 0..=100; the motion intensity for motion alerts.
    pub confidence: f64,
    pub description: String,
    pub status: AlertStatus,
    pub status_history: Vec<StatusChange>,
}

impl Alert {
    /// A fresh alert in status `new`, with that status as its first history entry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AlertId,
        kind: AlertKind,
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        created_at: Timestamp,
        severity: Severity,
        confidence: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            source_id: source_id.into(),
            source_name: source_name.into(),
            created_at,
            severity,
            confidence,
            description: description.into(),
            status: AlertStatus::New,
            status_history: vec![StatusChange {
                status: AlertStatus::New,
                at: created_at,
            }],
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Moves the alert to `target` and records it. Legality is the caller's concern.
    pub(crate) fn apply_status(&mut self, target: AlertStatus, at: Timestamp) {
        self.status = target;
        self.status_history.push(StatusChange { status: target, at });
    }
}
