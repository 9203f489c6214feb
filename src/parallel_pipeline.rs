// THEORY:
// The `ParallelPipeline` runs the same per-source logic as `MotionPipeline`, but
// gives every camera its own tokio task. A worker exclusively owns that source's
// `SourceMonitor` (previous frame, gate, connection flag), so sources never
// contend with each other; the only shared pieces are the alert factory (an
// atomic counter) and the lifecycle manager (one registry lock).
//
// Frames reach a worker through a bounded mpsc channel, which keeps per-source
// ordering intact. A capture loop that must never stall uses `try_submit_frame`
// and loses frames when its worker falls behind; everything else awaits capacity
// with `submit_frame`. Shutdown closes every channel, lets the workers drain what
// is already queued and joins them.

use crate::config::MonitorConfig;
use crate::core_modules::alert_factory::AlertFactory;
use crate::core_modules::alert_manager::AlertLifecycleManager;
use crate::core_modules::clock::{Clock, SystemClock, Timestamp};
use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use crate::pipeline::{
    FrameOutcome, PipelineSettings, SourceMonitor, raise_connection_lost_alert, raise_motion_alert,
};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

pub const DEFAULT_FRAME_QUEUE_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Worker for source {0} has stopped")]
    WorkerStopped(String),
}

#[derive(Debug)]
enum SourceCommand {
    Frame { frame: PixelBuffer, at: Timestamp },
    ConnectionLost { at: Timestamp },
    ConnectionRestored,
}

/// What one worker did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub source_id: String,
    pub frames_processed: u64,
    pub alerts_raised: u64,
}

struct SourceWorker {
    sender: mpsc::Sender<SourceCommand>,
    handle: JoinHandle<WorkerReport>,
}

struct WorkerContext {
    manager: Arc<AlertLifecycleManager>,
    factory: Arc<AlertFactory>,
}

pub struct ParallelPipeline {
    settings: PipelineSettings,
    queue_size: usize,
    manager: Arc<AlertLifecycleManager>,
    factory: Arc<AlertFactory>,
    clock: Arc<dyn Clock>,
    workers: Mutex<HashMap<String, SourceWorker>>,
}

impl ParallelPipeline {
    pub fn new(settings: PipelineSettings, queue_size: usize, manager: Arc<AlertLifecycleManager>) -> Self {
        Self {
            settings,
            queue_size: queue_size.max(1),
            manager,
            factory: Arc::new(AlertFactory::new()),
            clock: Arc::new(SystemClock),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a pipeline and spawns a worker for every configured source.
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &MonitorConfig, manager: Arc<AlertLifecycleManager>) -> Self {
        let pipeline = Self::new(
            PipelineSettings::from(&config.detection),
            config.pipeline.frame_queue_size,
            manager,
        );
        for source in &config.sources {
            pipeline.register_source(&source.id, source.display_name());
        }
        pipeline
    }

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

    pub fn source_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Spawns the worker for `source_id` unless it already runs.
    pub fn register_source(&self, source_id: &str, name: &str) {
        let mut workers = self.workers.lock();
        if !workers.contains_key(source_id) {
            let worker = self.spawn_worker(source_id, name);
            workers.insert(source_id.to_string(), worker);
        }
    }

    /// Queues a frame stamped with the pipeline clock, waiting for queue space.
    pub async fn submit_frame(&self, source_id: &str, frame: PixelBuffer) -> Result<(), PipelineError> {
        let at = self.clock.now();
        self.submit_frame_at(source_id, frame, at).await
    }

    pub async fn submit_frame_at(
        &self,
        source_id: &str,
        frame: PixelBuffer,
        at: Timestamp,
    ) -> Result<(), PipelineError> {
        self.send(source_id, SourceCommand::Frame { frame, at }).await
    }

    /// Queues a frame without waiting. Returns `Ok(false)` when the frame was dropped
    /// because the worker is backlogged.
    pub fn try_submit_frame(&self, source_id: &str, frame: PixelBuffer) -> Result<bool, PipelineError> {
        let at = self.clock.now();
        self.try_submit_frame_at(source_id, frame, at)
    }

    pub fn try_submit_frame_at(
        &self,
        source_id: &str,
        frame: PixelBuffer,
        at: Timestamp,
    ) -> Result<bool, PipelineError> {
        let sender = self.sender_for(source_id);
        match sender.try_send(SourceCommand::Frame { frame, at }) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!(source_id = %source_id, "Worker backlogged, frame dropped");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(PipelineError::WorkerStopped(source_id.to_string()))
            }
        }
    }

    pub async fn connection_lost(&self, source_id: &str) -> Result<(), PipelineError> {
        let at = self.clock.now();
        self.connection_lost_at(source_id, at).await
    }

    pub async fn connection_lost_at(&self, source_id: &str, at: Timestamp) -> Result<(), PipelineError> {
        self.send(source_id, SourceCommand::ConnectionLost { at }).await
    }

    pub async fn connection_restored(&self, source_id: &str) -> Result<(), PipelineError> {
        self.send(source_id, SourceCommand::ConnectionRestored).await
    }

    /// Closes every queue, waits for the workers to drain and returns their reports
    /// sorted by source id.
    pub async fn shutdown(self) -> Vec<WorkerReport> {
        let workers: Vec<(String, SourceWorker)> = self.workers.lock().drain().collect();
        info!(sources = workers.len(), "Stopping pipeline");

        let handles = workers.into_iter().map(|(source_id, worker)| {
            let SourceWorker { sender, handle } = worker;
            drop(sender);
            async move {
                match handle.await {
                    Ok(report) => report,
                    Err(err) => {
                        error!(source_id = %source_id, error = %err, "Worker task failed");
                        WorkerReport {
                            source_id,
                            ..WorkerReport::default()
                        }
                    }
                }
            }
        });

        let mut reports = join_all(handles).await;
        reports.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        reports
    }

    async fn send(&self, source_id: &str, command: SourceCommand) -> Result<(), PipelineError> {
        // Clone the sender so the map lock is never held across an await.
        let sender = self.sender_for(source_id);
        sender
            .send(command)
            .await
            .map_err(|_| PipelineError::WorkerStopped(source_id.to_string()))
    }

    fn sender_for(&self, source_id: &str) -> mpsc::Sender<SourceCommand> {
        let mut workers = self.workers.lock();
        workers
            .entry(source_id.to_string())
            .or_insert_with(|| self.spawn_worker(source_id, source_id))
            .sender
            .clone()
    }

    fn spawn_worker(&self, source_id: &str, name: &str) -> SourceWorker {
        let (sender, receiver) = mpsc::channel(self.queue_size);
        let monitor = SourceMonitor::new(source_id, name, self.settings);
        let shared = WorkerContext {
            manager: Arc::clone(&self.manager),
            factory: Arc::clone(&self.factory),
        };
        info!(source_id = %source_id, name = %name, "Source worker started");
        let handle = tokio::spawn(run_worker(monitor, receiver, shared));
        SourceWorker { sender, handle }
    }
}

async fn run_worker(
    mut monitor: SourceMonitor,
    mut receiver: mpsc::Receiver<SourceCommand>,
    shared: WorkerContext,
) -> WorkerReport {
    let mut report = WorkerReport {
        source_id: monitor.source_id().to_string(),
        ..WorkerReport::default()
    };

    while let Some(command) = receiver.recv().await {
        let raised = match command {
            SourceCommand::Frame { frame, at } => {
                report.frames_processed += 1;
                match monitor.observe_frame(frame, at) {
                    FrameOutcome::Motion(event) => {
                        raise_motion_alert(&shared.manager, &shared.factory, &event, monitor.name())
                    }
                    FrameOutcome::Baseline | FrameOutcome::Quiet(_) => None,
                }
            }
            SourceCommand::ConnectionLost { at } => {
                if monitor.mark_lost() {
                    raise_connection_lost_alert(&shared.manager, &shared.factory, &monitor, at)
                } else {
                    None
                }
            }
            SourceCommand::ConnectionRestored => {
                if monitor.mark_restored() {
                    info!(source_id = %monitor.source_id(), "Source connection restored");
                }
                None
            }
        };
        if raised.is_some() {
            report.alerts_raised += 1;
        }
    }

    info!(
        source_id = %report.source_id,
        frames = report.frames_processed,
        alerts = report.alerts_raised,
        "Source worker stopped"
    );
    report
}
