//! Classification against a log file that keeps changing underneath
//!
//! Tests for: dedup across ticks, rotation reset, over-long lines,
//! ready marker lookup

use std::fs;

use sunrise::monitor::{
    find_ready_marker, parse_log_timestamp, Classifier, ClassifyError, FaultCategory, LineScanner,
    PatternSet, ScanError, Verdict,
};

use super::helpers::*;

const ENCODER: &str = "Fatal: Unable to find display or encoder";

fn encoder_patterns() -> PatternSet {
    PatternSet::new([ENCODER, "Failed to initialize video capture/encoding"])
}

#[test]
fn test_fault_handled_once_until_newer_occurrence() {
    let (_temp_dir, path) = temp_log(&log_line("2025-03-01 08:00:00.000", "Info: started"));
    let mut classifier = Classifier::new(&path);
    let patterns = encoder_patterns();

    let verdict = classifier.check(FaultCategory::EncoderFailure, &patterns).unwrap();
    assert_eq!(verdict, Verdict::NotFound);

    append(&path, &log_line("2025-03-01 08:05:00.000", &format!("Error: {ENCODER}")));
    let verdict = classifier.check(FaultCategory::EncoderFailure, &patterns).unwrap();
    assert!(verdict.is_triggered());

    append(&path, &log_line("2025-03-01 08:05:01.000", "Info: unrelated"));
    let verdict = classifier.check(FaultCategory::EncoderFailure, &patterns).unwrap();
    assert!(matches!(verdict, Verdict::AlreadyHandled { .. }));

    append(
        &path,
        &log_line(
            "2025-03-01 08:10:00.000",
            "Error: Failed to initialize video capture/encoding",
        ),
    );
    let verdict = classifier.check(FaultCategory::EncoderFailure, &patterns).unwrap();
    match verdict {
        Verdict::Triggered(event) => {
            assert_eq!(event.category, FaultCategory::EncoderFailure);
            assert_eq!(
                event.occurred_at,
                parse_log_timestamp("[2025-03-01 08:10:00.000]").unwrap()
            );
            assert!(event.raw_line.contains("video capture"));
        }
        other => panic!("expected trigger, got {other:?}"),
    }
}

#[test]
fn test_rotation_allows_older_timestamp_to_trigger() {
    let failure = log_line("2025-03-01 08:05:00.000", &format!("Error: {ENCODER}"));
    let (_temp_dir, path) = temp_log(&format!(
        "{}{}",
        log_line("2025-03-01 08:00:00.000", "Info: a long preamble line to make the file larger"),
        failure
    ));
    let mut classifier = Classifier::new(&path);
    let patterns = encoder_patterns();

    assert!(classifier
        .check(FaultCategory::EncoderFailure, &patterns)
        .unwrap()
        .is_triggered());

    // Rotated to a smaller file holding an older failure
    fs::write(
        &path,
        log_line("2025-03-01 07:00:00.000", &format!("Error: {ENCODER}")),
    )
    .unwrap();

    assert!(classifier
        .check(FaultCategory::EncoderFailure, &patterns)
        .unwrap()
        .is_triggered());
}

#[test]
fn test_categories_are_tracked_independently() {
    let (_temp_dir, path) = temp_log(&format!(
        "{}{}",
        log_line("2025-03-01 08:00:00.000", "Error: Couldn't find monitor"),
        log_line("2025-03-01 08:00:01.000", &format!("Error: {ENCODER}")),
    ));
    let mut classifier = Classifier::new(&path);
    let monitor = PatternSet::new(["Couldn't find monitor"]);

    assert!(classifier
        .check(FaultCategory::MonitorSleep, &monitor)
        .unwrap()
        .is_triggered());
    assert!(classifier
        .check(FaultCategory::EncoderFailure, &encoder_patterns())
        .unwrap()
        .is_triggered());
    assert_ne!(
        classifier.last_handled(FaultCategory::MonitorSleep),
        classifier.last_handled(FaultCategory::EncoderFailure)
    );
}

#[test]
fn test_over_long_line_reports_corruption() {
    let mut content = log_line("2025-03-01 08:00:00.000", &format!("Error: {ENCODER}"));
    content.push_str(&"y".repeat(2_000_000));
    content.push('\n');
    let (_temp_dir, path) = temp_log(&content);

    let mut classifier = Classifier::new(&path);
    let verdict = classifier
        .check(FaultCategory::EncoderFailure, &encoder_patterns())
        .unwrap();

    assert_eq!(verdict, Verdict::CorruptionDetected);
}

#[test]
fn test_scanner_stops_at_over_long_line() {
    let (_temp_dir, path) = temp_log(&format!("short\n{}\nafter\n", "z".repeat(64)));
    let file = fs::File::open(&path).unwrap();
    let mut scanner = LineScanner::with_limit(std::io::BufReader::new(file), 16);

    assert_eq!(scanner.next().unwrap().unwrap(), "short");
    assert!(matches!(
        scanner.next(),
        Some(Err(ScanError::LineTooLong { limit: 16 }))
    ));
    assert!(scanner.next().is_none());
}

#[test]
fn test_missing_log_is_an_access_error() {
    let (temp_dir, path) = temp_log("");
    fs::remove_file(&path).unwrap();
    let mut classifier = Classifier::new(&path);

    let result = classifier.check(FaultCategory::EncoderFailure, &encoder_patterns());

    assert!(matches!(result, Err(ClassifyError::LogAccess { .. })));
    drop(temp_dir);
}

#[test]
fn test_ready_marker_latest_timestamp() {
    let (_temp_dir, path) = temp_log(&format!(
        "{}{}{}",
        log_line("2025-03-01 08:00:00.000", "Info: Starting main loop"),
        log_line("2025-03-01 08:30:00.000", "Info: Starting main loop"),
        log_line("2025-03-01 08:31:00.000", "Info: client connected"),
    ));

    let ready = find_ready_marker(&path, "Starting main loop").unwrap();

    assert_eq!(
        ready,
        Some(parse_log_timestamp("[2025-03-01 08:30:00.000]").unwrap())
    );
    assert_eq!(find_ready_marker(&path, "never logged").unwrap(), None);
}
