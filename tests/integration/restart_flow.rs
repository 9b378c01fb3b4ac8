//! Restart sequences against an in-memory process table
//!
//! Tests for: orphan reaping, log baseline reset, corruption recovery

use nix::sys::signal::Signal;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sunrise::process::ProcessTable;
use sunrise::restart::{RestartCoordinator, RestartError, RestartTimings};

use super::helpers::*;

#[test]
fn test_restart_reaps_orphans_and_clears_log() {
    let (_temp_dir, path) = temp_log(&log_line("2025-03-01 08:00:00.000", "Error: stale"));
    let table = MemoryTable::with_pids(&[310, 311]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(400), &path);
    let coordinator = RestartCoordinator::new(
        &path,
        no_delays(),
        Arc::new(ScriptedSelector(Arc::clone(&host))),
        table.clone(),
    );

    let report = coordinator.restart().unwrap();

    assert_eq!(report.controller, "scripted");
    assert_eq!(report.reaped, vec![310, 311]);
    assert!(!report.escalated);
    assert_eq!(report.running, vec![400]);
    assert_eq!(
        table.signals(),
        vec![(310, Signal::SIGTERM), (311, Signal::SIGTERM)]
    );
    assert_eq!(host.log_len_at_start(), vec![0]);
}

#[test]
fn test_restart_without_process_after_start_fails() {
    let (_temp_dir, path) = temp_log("");
    let table = MemoryTable::with_pids(&[]);
    let host = ScriptedHost::new(Arc::clone(&table), None, &path);
    let coordinator = RestartCoordinator::new(
        &path,
        no_delays(),
        Arc::new(ScriptedSelector(Arc::clone(&host))),
        table.clone(),
    );

    let result = coordinator.restart();

    assert!(matches!(result, Err(RestartError::RestartFailed)));
    assert_eq!(host.starts(), 1);
    assert!(table.matching_pids().is_empty());
}

#[test]
fn test_corruption_recovery_clears_log_then_restarts() {
    let (_temp_dir, path) = temp_log(&"q".repeat(2_000_000));
    let table = MemoryTable::with_pids(&[500]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(501), &path);
    let coordinator = RestartCoordinator::new(
        &path,
        no_delays(),
        Arc::new(ScriptedSelector(Arc::clone(&host))),
        table.clone(),
    );

    let report = coordinator.recover_corrupted_log().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(report.running, vec![501]);
    assert_eq!(host.log_len_at_start(), vec![0]);
}

#[test]
fn test_overlapping_restart_requests_share_one_sequence() {
    let (_temp_dir, path) = temp_log("");
    let table = MemoryTable::with_pids(&[600]);
    let host = ScriptedHost::new(Arc::clone(&table), Some(601), &path);
    let timings = RestartTimings {
        termination_wait: Duration::from_millis(400),
        ..no_delays()
    };
    let coordinator = Arc::new(RestartCoordinator::new(
        &path,
        timings,
        Arc::new(ScriptedSelector(Arc::clone(&host))),
        table.clone(),
    ));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.restart())
    };
    thread::sleep(Duration::from_millis(100));
    let second = coordinator.restart().unwrap();
    let first = first.join().unwrap().unwrap();

    assert_eq!(first.running, vec![601]);
    assert_eq!(second, first);
    assert_eq!(host.starts(), 1);
    assert_eq!(table.signals(), vec![(600, Signal::SIGTERM)]);

    // A request after the sequence finished runs a fresh one
    coordinator.restart().unwrap();
    assert_eq!(host.starts(), 2);
}
