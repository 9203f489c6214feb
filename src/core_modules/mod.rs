pub mod alert;
pub mod alert_factory;
pub mod alert_manager;
pub mod authorization;
pub mod clock;
pub mod motion_estimator;
pub mod motion_gate;
pub mod pixel;
pub mod pixel_buffer;
pub mod sinks;
pub mod utils;
