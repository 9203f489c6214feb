// THEORY:
// This file is the entry point of the `motion_sentry` library crate. It turns a
// stream of camera frames into a curated, permission-checked list of security
// alerts.
//
// The public surface is two drivers (`MotionPipeline` for callers that own
// their own loop, `ParallelPipeline` for one tokio task per camera) and the
// `AlertLifecycleManager` they feed, which is what a dashboard queries and
// subscribes to. The individual stages live in `core_modules` and stay usable on
// their own.

pub mod config;
pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::{ConfigValidationError, MonitorConfig};
pub use core_modules::alert::{Alert, AlertAction, AlertId, AlertKind, AlertStatus, Severity};
pub use core_modules::alert_manager::{
    AlertEvent, AlertFilter, AlertLifecycleManager, ManagerSettings, TransitionError,
};
pub use core_modules::authorization::{Actor, Authorizer, RoleAuthorizer};
pub use core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
pub use parallel_pipeline::{ParallelPipeline, PipelineError};
pub use pipeline::{MotionPipeline, PipelineSettings};
