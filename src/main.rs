// Demo runner for the `motion_sentry` library.
//
// Usage: motion_sentry [config.toml]
//
// Feeds a few seconds of synthetic footage from two cameras through the
// `ParallelPipeline` and prints every alert event as a JSON line.

use anyhow::{Context, Result};
use motion_sentry::config::{LoggingConfig, MonitorConfig, SourceConfig};
use motion_sentry::core_modules::alert_manager::AlertEvent;
use motion_sentry::core_modules::authorization::{Actor, ROLE_OPERATOR, RoleAuthorizer};
use motion_sentry::core_modules::pixel::pixel::Pixel;
use motion_sentry::core_modules::sinks::{LogNotificationSink, LogSoundSink};
use motion_sentry::{AlertLifecycleManager, AlertStatus, ParallelPipeline, PixelBuffer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;
const TICKS: u32 = 12;
const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = MonitorConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging);

    if config.sources.is_empty() {
        config.sources = vec![
            SourceConfig {
                id: "CAM-1".to_string(),
                name: Some("Front door".to_string()),
            },
            SourceConfig {
                id: "CAM-2".to_string(),
                name: Some("Back yard".to_string()),
            },
        ];
    }

    info!(
        threshold = config.detection.threshold,
        cooldown_ms = config.detection.cooldown_ms,
        sources = config.sources.len(),
        "Starting motion sentry demo"
    );

    let manager = Arc::new(
        AlertLifecycleManager::new(config.alerts.manager_settings())
            .with_authorizer(Arc::new(RoleAuthorizer::with_defaults()))
            .with_notification_sink(Arc::new(LogNotificationSink))
            .with_sound_sink(Arc::new(LogSoundSink)),
    );
    let mut events = manager.subscribe();
    let pipeline = ParallelPipeline::from_config(&config, Arc::clone(&manager));

    for tick in 0..TICKS {
        pipeline
            .submit_frame("CAM-1", moving_square(tick))
            .await
            .context("Failed to submit frame")?;

        if tick == 8 {
            pipeline.connection_lost("CAM-2").await?;
        } else if tick < 8 && !pipeline.try_submit_frame("CAM-2", flicker(tick))? {
            warn!("CAM-2 frame dropped");
        }

        tokio::time::sleep(TICK_INTERVAL).await;
    }

    for report in pipeline.shutdown().await {
        info!(
            source_id = %report.source_id,
            frames = report.frames_processed,
            alerts = report.alerts_raised,
            "Source finished"
        );
    }

    let operator = Actor::new("demo-operator", ROLE_OPERATOR);
    if let Some(latest) = manager.alerts().first() {
        manager
            .transition(&latest.id, AlertStatus::Acknowledged, &operator)
            .context("Failed to acknowledge alert")?;
    }

    while let Ok(event) = events.try_recv() {
        let line = match event {
            AlertEvent::Admitted(alert) => serde_json::json!({ "event": "admitted", "alert": alert }),
            AlertEvent::Changed { alert, previous } => {
                serde_json::json!({ "event": "changed", "previous": previous, "alert": alert })
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    let counts = manager.counts_by_status();
    info!(
        total = counts.total(),
        active = manager.active_count(),
        stats = ?manager.delivery_stats(),
        "Demo finished"
    );

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }
}

/// A bright square sliding across a dark background.
fn moving_square(tick: u32) -> PixelBuffer {
    const SIDE: u32 = 24;
    const STEP: u32 = 12;
    let left = (tick * STEP) % (FRAME_WIDTH - SIDE);
    let top = (FRAME_HEIGHT - SIDE) / 2;

    PixelBuffer::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        if (left..left + SIDE).contains(&x) && (top..top + SIDE).contains(&y) {
            Pixel::grey(240)
        } else {
            Pixel::grey(16)
        }
    })
}

/// A static scene with a faint brightness flicker, well under the noise floor.
fn flicker(tick: u32) -> PixelBuffer {
    let level = 80 + (tick % 2) as u8 * 4;
    PixelBuffer::filled(FRAME_WIDTH, FRAME_HEIGHT, Pixel::new(level, level, level + 10))
}
