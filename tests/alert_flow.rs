use motion_sentry::core_modules::alert_manager::{Admission, AlertEvent};
use motion_sentry::core_modules::authorization::{Actor, ROLE_ADMIN, ROLE_OPERATOR, ROLE_VIEWER};
use motion_sentry::core_modules::clock::{ManualClock, timestamp_from_millis};
use motion_sentry::core_modules::motion_estimator::EstimatorSettings;
use motion_sentry::core_modules::motion_gate::GateSettings;
use motion_sentry::core_modules::pixel::pixel::Pixel;
use motion_sentry::core_modules::sinks::{LogNotificationSink, LogSoundSink};
use motion_sentry::{
    AlertAction, AlertFilter, AlertKind, AlertLifecycleManager, AlertStatus, ManagerSettings,
    MotionPipeline, PipelineSettings, PixelBuffer, Severity, TransitionError,
};
use std::sync::Arc;

fn frame(value: u8) -> PixelBuffer {
    PixelBuffer::filled(32, 24, Pixel::grey(value))
}

fn create_test_pipeline(cooldown_ms: u64) -> (MotionPipeline, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_millis(0));
    let manager = Arc::new(
        AlertLifecycleManager::new(ManagerSettings::default())
            .with_clock(clock.clone())
            .with_notification_sink(Arc::new(LogNotificationSink))
            .with_sound_sink(Arc::new(LogSoundSink)),
    );
    let settings = PipelineSettings {
        estimator: EstimatorSettings {
            sensitivity_multiplier: 1.0,
            ..EstimatorSettings::default()
        },
        gate: GateSettings {
            threshold: 30.0,
            cooldown_ms,
        },
    };
    let mut pipeline = MotionPipeline::new(settings, manager).with_clock(clock.clone());
    pipeline.register_source("CAM-1", "Front door");
    (pipeline, clock)
}

#[test]
fn cam1_scenario_from_frames_to_dismissal() {
    let (mut pipeline, clock) = create_test_pipeline(3_000);
    let mut raised = Vec::new();

    // Readings between consecutive frames: 5, 5, 95, 95, 95.
    for (tick, value) in [0u8, 5, 10, 105, 10, 105].into_iter().enumerate() {
        clock.set(timestamp_from_millis(tick as i64 * 1_000));
        if let Some(alert) = pipeline.on_frame("CAM-1", frame(value)) {
            raised.push((tick, alert));
        }
    }

    assert_eq!(raised.len(), 1);
    let (tick, alert) = &raised[0];
    assert_eq!(*tick, 3);
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.confidence, 95.0);
    assert_eq!(alert.status, AlertStatus::New);
    assert_eq!(alert.kind, AlertKind::Motion);
    assert_eq!(alert.description, "Motion detected (95% intensity)");

    let manager = Arc::clone(pipeline.manager());
    let operator = Actor::new("op-1", ROLE_OPERATOR);

    let acknowledged = manager
        .transition(&alert.id, AlertStatus::Acknowledged, &operator)
        .unwrap();
    assert_eq!(acknowledged.status, AlertStatus::Acknowledged);

    let dismissed = manager
        .transition(&alert.id, AlertStatus::Dismissed, &operator)
        .unwrap();
    assert_eq!(dismissed.status, AlertStatus::Dismissed);

    let again = manager.transition(&alert.id, AlertStatus::Acknowledged, &operator);
    assert!(matches!(
        again,
        Err(TransitionError::InvalidTransition {
            from: AlertStatus::Dismissed,
            to: AlertStatus::Acknowledged,
            ..
        })
    ));

    let stored = manager.get(&alert.id).unwrap();
    let history: Vec<AlertStatus> = stored.status_history.iter().map(|c| c.status).collect();
    assert_eq!(
        history,
        vec![AlertStatus::New, AlertStatus::Acknowledged, AlertStatus::Dismissed]
    );
}

#[test]
fn subscribers_see_admissions_and_changes() {
    let (mut pipeline, clock) = create_test_pipeline(1_000);
    let manager = Arc::clone(pipeline.manager());
    let mut events = manager.subscribe();

    pipeline.on_frame("CAM-1", frame(0));
    clock.advance_millis(500);
    let alert = pipeline.on_frame("CAM-1", frame(70)).unwrap();
    manager
        .transition(&alert.id, AlertStatus::Investigating, &Actor::new("v", ROLE_VIEWER))
        .unwrap();

    match events.try_recv().unwrap() {
        AlertEvent::Admitted(admitted) => assert_eq!(admitted.id, alert.id),
        other => panic!("expected admission, got {other:?}"),
    }
    match events.try_recv().unwrap() {
        AlertEvent::Changed { alert: changed, previous } => {
            assert_eq!(previous, AlertStatus::New);
            assert_eq!(changed.status, AlertStatus::Investigating);
        }
        other => panic!("expected change, got {other:?}"),
    }
    assert!(events.try_recv().is_err());
}

#[test]
fn readmitting_an_alert_changes_nothing() {
    let (mut pipeline, clock) = create_test_pipeline(1_000);
    let manager = Arc::clone(pipeline.manager());

    pipeline.on_frame("CAM-1", frame(0));
    clock.advance_millis(100);
    let alert = pipeline.on_frame("CAM-1", frame(200)).unwrap();

    assert_eq!(manager.admit(alert.clone()), Admission::Duplicate);
    assert_eq!(manager.len(), 1);
    let stats = manager.delivery_stats();
    assert_eq!(stats.notifications_sent, 1);
    assert_eq!(stats.cues_played, 1);
}

#[test]
fn viewers_cannot_acknowledge_or_dismiss() {
    let (mut pipeline, clock) = create_test_pipeline(1_000);
    let manager = Arc::clone(pipeline.manager());

    pipeline.on_frame("CAM-1", frame(0));
    clock.advance_millis(100);
    let alert = pipeline.on_frame("CAM-1", frame(200)).unwrap();

    let viewer = Actor::new("v-1", ROLE_VIEWER);
    for target in [AlertStatus::Acknowledged, AlertStatus::Dismissed] {
        let result = manager.transition(&alert.id, target, &viewer);
        assert!(matches!(result, Err(TransitionError::PermissionDenied { .. })));
    }
    assert_eq!(manager.get(&alert.id).unwrap().status, AlertStatus::New);

    let admin = Actor::new("a-1", ROLE_ADMIN);
    assert!(manager.transition(&alert.id, AlertStatus::Dismissed, &admin).is_ok());
    assert_eq!(
        AlertAction::for_target(AlertStatus::Dismissed),
        Some(AlertAction::Dismiss)
    );
}

#[test]
fn outage_alert_bypasses_gate_once() {
    let (mut pipeline, clock) = create_test_pipeline(60_000);
    let manager = Arc::clone(pipeline.manager());

    pipeline.on_frame("CAM-1", frame(0));
    clock.advance_millis(100);
    assert!(pipeline.on_frame("CAM-1", frame(200)).is_some());

    clock.advance_millis(100);
    let lost = pipeline.on_connection_lost("CAM-1").unwrap();
    assert!(pipeline.on_connection_lost("CAM-1").is_none());

    assert_eq!(lost.kind, AlertKind::ConnectionLost);
    assert_eq!(lost.severity, Severity::High);
    assert_eq!(lost.source_name, "Front door");

    let outages = manager.query(&AlertFilter::new().text("connection"));
    assert_eq!(outages.len(), 1);
    assert_eq!(manager.counts_by_severity().get(Severity::High), 1);
    assert_eq!(manager.active_count(), 2);

    assert_eq!(manager.clear_all(), 2);
    assert_eq!(manager.active_count(), 0);
    assert_eq!(manager.len(), 2);
}

#[test]
fn concurrent_sources_share_one_registry() {
    let manager = Arc::new(AlertLifecycleManager::default());
    let factory = Arc::new(motion_sentry::core_modules::alert_factory::AlertFactory::new());

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let manager = Arc::clone(&manager);
            let factory = Arc::clone(&factory);
            std::thread::spawn(move || {
                let mut pipeline = MotionPipeline::new(PipelineSettings::default(), manager)
                    .with_factory(factory);
                let source = format!("CAM-{n}");
                pipeline.on_frame_at(&source, frame(0), timestamp_from_millis(0));
                pipeline
                    .on_frame_at(&source, frame(255), timestamp_from_millis(0))
                    .is_some()
            })
        })
        .collect();

    let raised = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|raised| *raised)
        .count();
    assert_eq!(raised, 8);
    assert_eq!(manager.len(), 8);
    assert_eq!(manager.query(&AlertFilter::new().severity(Severity::Critical)).len(), 8);
}
