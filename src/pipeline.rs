// THEORY:
// The `pipeline` module is the top-level, synchronous API of the engine. It wires
// the core stages together for any number of camera sources:
//
//   frame -> MotionEstimator -> MotionGate -> AlertFactory -> AlertLifecycleManager
//
// Every source gets its own `SourceMonitor`, which owns everything that is
// specific to that camera: the previous frame, its gate, its display name and
// whether it is currently connected. Monitors never look at each other, so the
// async `ParallelPipeline` can hand one monitor to one worker task and reuse
// exactly the same per-frame logic.
//
// Connection loss takes a bypass around the estimator and the gate. It is
// reported once per disconnection; restoring the source (explicitly, or by a
// frame arriving) re-arms the report and starts a fresh baseline, because the
// last frame before an outage says nothing about the first frame after it.

use crate::config::{DetectionConfig, MonitorConfig};
use crate::core_modules::alert::Alert;
use crate::core_modules::alert_factory::AlertFactory;
use crate::core_modules::alert_manager::{Admission, AlertLifecycleManager};
use crate::core_modules::clock::{Clock, SystemClock, Timestamp};
use crate::core_modules::motion_estimator::{EstimatorSettings, MotionEstimator, MotionReading};
use crate::core_modules::motion_gate::{GateSettings, MotionEvent, MotionGate};
use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, trace};

/// Detection tunables shared by every source of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineSettings {
    pub estimator: EstimatorSettings,
    pub gate: GateSettings,
}

impl From<&DetectionConfig> for PipelineSettings {
    fn from(detection: &DetectionConfig) -> Self {
        Self {
            estimator: detection.estimator_settings(),
            gate: detection.gate_settings(),
        }
    }
}

/// What a monitor concluded from one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// First frame after start or after an outage; nothing to compare against yet.
    Baseline,
    /// A reading that stayed below the threshold or inside the cooldown.
    Quiet(MotionReading),
    Motion(MotionEvent),
}

/// Per-source detection state.
#[derive(Debug)]
pub struct SourceMonitor {
    source_id: String,
    name: String,
    estimator: MotionEstimator,
    gate: MotionGate,
    previous: Option<PixelBuffer>,
    connected: bool,
    frames_seen: u64,
}

impl SourceMonitor {
    pub fn new(source_id: impl Into<String>, name: impl Into<String>, settings: PipelineSettings) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            estimator: MotionEstimator::new(settings.estimator),
            gate: MotionGate::new(settings.gate),
            previous: None,
            connected: true,
            frames_seen: 0,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Compares `frame` with the previous one and runs the reading through the gate.
    pub fn observe_frame(&mut self, frame: PixelBuffer, at: Timestamp) -> FrameOutcome {
        if !self.connected {
            info!(source_id = %self.source_id, "Frames resumed after connection loss");
            self.mark_restored();
        }
        self.frames_seen += 1;

        let reading = self
            .previous
            .as_ref()
            .map(|previous| self.estimator.estimate(previous, &frame, at));
        self.previous = Some(frame);

        let Some(reading) = reading else {
            trace!(source_id = %self.source_id, "Baseline frame stored");
            return FrameOutcome::Baseline;
        };
        trace!(
            source_id = %self.source_id,
            intensity = reading.intensity,
            changed_pixels = reading.pixel_change_count,
            "Frame compared"
        );

        match self.gate.observe(&self.source_id, reading) {
            Some(event) => FrameOutcome::Motion(event),
            None => FrameOutcome::Quiet(reading),
        }
    }

    /// Marks the source as lost. Returns `false` when it already was.
    pub fn mark_lost(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        self.connected = false;
        self.previous = None;
        self.gate.reset(&self.source_id);
        true
    }

    /// Marks the source as connected again. Returns `false` when it already was.
    pub fn mark_restored(&mut self) -> bool {
        if self.connected {
            return false;
        }
        self.connected = true;
        self.previous = None;
        self.gate.reset(&self.source_id);
        true
    }
}

/// Turns a gated event into an alert and admits it. `None` for duplicates.
pub(crate) fn raise_motion_alert(
    manager: &AlertLifecycleManager,
    factory: &AlertFactory,
    event: &MotionEvent,
    source_name: &str,
) -> Option<Alert> {
    let alert = factory.create(event, source_name);
    admit(manager, alert)
}

pub(crate) fn raise_connection_lost_alert(
    manager: &AlertLifecycleManager,
    factory: &AlertFactory,
    monitor: &SourceMonitor,
    at: Timestamp,
) -> Option<Alert> {
    info!(source_id = %monitor.source_id(), "Source connection lost");
    let alert = factory.create_connection_lost(monitor.source_id(), monitor.name(), at);
    admit(manager, alert)
}

fn admit(manager: &AlertLifecycleManager, alert: Alert) -> Option<Alert> {
    match manager.admit(alert.clone()) {
        Admission::Admitted => Some(alert),
        Admission::Duplicate => None,
    }
}

/// The synchronous multi-source driver.
pub struct MotionPipeline {
    settings: PipelineSettings,
    manager: Arc<AlertLifecycleManager>,
    factory: Arc<AlertFactory>,
    clock: Arc<dyn Clock>,
    sources: HashMap<String, SourceMonitor>,
}

impl MotionPipeline {
    pub fn new(settings: PipelineSettings, manager: Arc<AlertLifecycleManager>) -> Self {
        Self {
            settings,
            manager,
            factory: Arc::new(AlertFactory::new()),
            clock: Arc::new(SystemClock),
            sources: HashMap::new(),
        }
    }

    /// Builds a pipeline with every configured source registered.
    pub fn from_config(config: &MonitorConfig, manager: Arc<AlertLifecycleManager>) -> Self {
        let mut pipeline = Self::new(PipelineSettings::from(&config.detection), manager);
        for source in &config.sources {
            pipeline.register_source(source.id.clone(), source.display_name());
        }
        pipeline
    }

    /// Shares an id counter with other pipelines feeding the same manager.
    pub fn with_factory(mut self, factory: Arc<AlertFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn manager(&self) -> &Arc<AlertLifecycleManager> {
        &self.manager
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Registers (or renames) a source. Unregistered sources are added on first use,
    /// named after their id.
    pub fn register_source(&mut self, source_id: impl Into<String>, name: impl Into<String>) {
        let source_id = source_id.into();
        let name = name.into();
        match self.sources.get_mut(&source_id) {
            Some(monitor) => monitor.name = name,
            None => {
                info!(source_id = %source_id, name = %name, "Source registered");
                let monitor = SourceMonitor::new(source_id.clone(), name, self.settings);
                self.sources.insert(source_id, monitor);
            }
        }
    }

    pub fn source(&self, source_id: &str) -> Option<&SourceMonitor> {
        self.sources.get(source_id)
    }

    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_connected(&self, source_id: &str) -> bool {
        self.sources.get(source_id).is_some_and(SourceMonitor::is_connected)
    }

    /// Processes one frame stamped with the pipeline clock.
    pub fn on_frame(&mut self, source_id: &str, frame: PixelBuffer) -> Option<Alert> {
        let at = self.clock.now();
        self.on_frame_at(source_id, frame, at)
    }

    /// Processes one frame captured at `at`. Returns the alert it raised, if any.
    pub fn on_frame_at(&mut self, source_id: &str, frame: PixelBuffer, at: Timestamp) -> Option<Alert> {
        let monitor = self.monitor_mut(source_id);
        match monitor.observe_frame(frame, at) {
            FrameOutcome::Motion(event) => {
                let name = monitor.name().to_string();
                raise_motion_alert(&self.manager, &self.factory, &event, &name)
            }
            FrameOutcome::Baseline | FrameOutcome::Quiet(_) => None,
        }
    }

    pub fn on_connection_lost(&mut self, source_id: &str) -> Option<Alert> {
        let at = self.clock.now();
        self.on_connection_lost_at(source_id, at)
    }

    /// Raises a connection-lost alert unless this disconnection was already reported.
    pub fn on_connection_lost_at(&mut self, source_id: &str, at: Timestamp) -> Option<Alert> {
        let monitor = self.monitor_mut(source_id);
        if !monitor.mark_lost() {
            trace!(source_id = %source_id, "Connection loss already reported");
            return None;
        }
        let monitor = self.sources.get(source_id)?;
        raise_connection_lost_alert(&self.manager, &self.factory, monitor, at)
    }

    /// Re-arms loss reporting and starts a fresh baseline. Returns `false` when the
    /// source was not marked lost.
    pub fn on_connection_restored(&mut self, source_id: &str) -> bool {
        let restored = self.monitor_mut(source_id).mark_restored();
        if restored {
            info!(source_id = %source_id, "Source connection restored");
        }
        restored
    }

    fn monitor_mut(&mut self, source_id: &str) -> &mut SourceMonitor {
        let settings = self.settings;
        self.sources
            .entry(source_id.to_string())
            .or_insert_with(|| SourceMonitor::new(source_id, source_id, settings))
    }
}
