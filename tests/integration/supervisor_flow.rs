//! Supervisor ticks and wake-cycle steps wired through the public API
//!
//! Tests for: config file to restart, wake then readiness, shared cooldown

use chrono::Local;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use sunrise::config::Config;
use sunrise::process::ProcessTable;
use sunrise::restart::RestartCoordinator;
use sunrise::supervisor::{Supervisor, SupervisorError, TickAction};
use sunrise::wake::{SharedWakeState, WakeAction, WakeCycleController, WakeDecision};

use super::helpers::*;

fn write_config(dir: &Path, log_path: &Path, extra: &str) -> Config {
    let config_path = dir.join("sunrise.cfg");
    fs::write(
        &config_path,
        format!(
            r#"
SunriseCheckSeconds = 1
SunshineLogPath = "{}"
MonitorIsOffLogLine = "Couldn't find monitor"
EncoderFailedLogLine = "Fatal: Unable to find display or encoder"
EncoderFailedLogLine2 = "Failed to initialize video capture/encoding"
WakeMonitorSleepSeconds = 0
RestartGraceSeconds = 0
ReapIntervalSeconds = 0
TerminationWaitSeconds = 0
VerifyClearSeconds = 0
StartupSettleSeconds = 0
{extra}
"#,
            log_path.display()
        ),
    )
    .unwrap();
    Config::load(&config_path).unwrap()
}

#[test]
fn test_encoder_failure_from_config_file_restarts_host() {
    let (temp_dir, path) = temp_log(&log_line(
        "2025-03-01 08:00:00.000",
        "Error: Failed to initialize video capture/encoding",
    ));
    let config = write_config(temp_dir.path(), &path, "RestartOnEncoderFailure = true");
    let table = MemoryTable::with_pids(&[700]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(701), &path);
    let waker = Arc::new(CountingWaker::default());
    let mut supervisor = Supervisor::with_components(
        Arc::new(config),
        Arc::new(ScriptedSelector(Arc::clone(&host))),
        table.clone(),
        waker.clone(),
    );

    let report = supervisor.tick().unwrap();
    assert_eq!(report.actions, vec![TickAction::EncoderRestart { ok: true }]);
    assert_eq!(host.starts(), 1);

    // The restart cleared the log, so nothing is left to act on
    let report = supervisor.tick().unwrap();
    assert!(report.actions.is_empty());
    assert_eq!(waker.calls(), 0);
}

#[test]
fn test_monitor_wake_on_tick_starts_cooldown_for_wake_cycle() {
    let (temp_dir, path) = temp_log(&log_line(
        "2025-03-01 08:00:00.000",
        "Error: Couldn't find monitor",
    ));
    let config = write_config(temp_dir.path(), &path, "");
    let table = MemoryTable::with_pids(&[800]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(801), &path);
    let waker = Arc::new(CountingWaker::default());
    let mut supervisor = Supervisor::with_components(
        Arc::new(config),
        Arc::new(ScriptedSelector(Arc::clone(&host))),
        table.clone(),
        waker.clone(),
    );

    let report = supervisor.tick().unwrap();

    assert_eq!(
        report.actions,
        vec![TickAction::MonitorWoken { restarted: false }]
    );
    assert_eq!(waker.calls(), 1);
    let decision = supervisor
        .wake_state()
        .lock()
        .wake_decision(Local::now(), std::time::Duration::from_secs(120));
    assert_eq!(decision, WakeDecision::CoolingDown);
}

#[test]
fn test_deleted_log_stops_supervisor() {
    let (temp_dir, path) = temp_log("");
    let config = write_config(temp_dir.path(), &path, "RestartOnEncoderFailure = true");
    let table = MemoryTable::with_pids(&[900]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(901), &path);
    let mut supervisor = Supervisor::with_components(
        Arc::new(config),
        Arc::new(ScriptedSelector(host)),
        table,
        Arc::new(CountingWaker::default()),
    );
    fs::remove_file(&path).unwrap();

    let err = supervisor.tick().unwrap_err();

    assert!(matches!(err, SupervisorError::LogAccess(_)));
    assert!(err.to_string().contains("sunshine.log"));
}

#[test]
fn test_wake_cycle_confirms_readiness_then_skips() {
    let (temp_dir, path) = temp_log(&log_line(
        &Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        "Info: Starting main loop",
    ));
    let config = Arc::new(write_config(temp_dir.path(), &path, ""));
    let table = MemoryTable::with_pids(&[1000]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(1001), &path);
    let selector = Arc::new(ScriptedSelector(Arc::clone(&host)));
    let state = Arc::new(SharedWakeState::new(&path));
    let waker = Arc::new(CountingWaker::default());
    let restarter = Arc::new(RestartCoordinator::new(
        &path,
        no_delays(),
        selector.clone(),
        table.clone(),
    ));
    let controller = WakeCycleController::new(
        config,
        Arc::clone(&state),
        restarter,
        selector,
        waker.clone(),
    );

    let first = controller.step();
    assert_eq!(first.action, WakeAction::Woke { ready: true });
    assert_eq!(waker.calls(), 1);
    assert!(!state.in_wake_cycle());

    let second = controller.step();
    assert_eq!(
        second.action,
        WakeAction::Skipped(WakeDecision::RecentlyReady)
    );
    assert_eq!(waker.calls(), 1);
    assert_eq!(host.starts(), 0);
}

#[test]
fn test_wake_cycle_restarts_dead_host() {
    let (temp_dir, path) = temp_log("");
    let config = Arc::new(write_config(temp_dir.path(), &path, ""));
    let table = MemoryTable::with_pids(&[]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(1101), &path);
    let selector = Arc::new(ScriptedSelector(Arc::clone(&host)));
    let restarter = Arc::new(RestartCoordinator::new(
        &path,
        no_delays(),
        selector.clone(),
        table.clone(),
    ));
    let controller = WakeCycleController::new(
        config,
        Arc::new(SharedWakeState::new(&path)),
        restarter,
        selector,
        Arc::new(CountingWaker::default()),
    );

    let report = controller.step();

    assert_eq!(report.action, WakeAction::RestartedDeadProcess { ok: true });
    assert_eq!(table.matching_pids(), vec![1101]);
}
