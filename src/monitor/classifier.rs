//! Fault classification over the monitored log
//!
//! Every configured trigger substring is matched against each scanned line.
//! Matching lines contribute their bracketed timestamp; the latest one is
//! compared against the last timestamp already handled for that category so
//! a fault is acted on exactly once.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cursor::LogCursor;
use super::scanner::{LineScanner, ScanError};
use super::timestamp::parse_log_timestamp;

/// Kinds of misbehaviour the supervisor distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    /// Display output inactive; remedied by waking the display
    MonitorSleep,
    /// Video encoder failed to initialize; remedied by a restart
    EncoderFailure,
    /// A log line exceeded the scan bound; remedied by clearing the log and restarting
    LogCorruption,
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultCategory::MonitorSleep => write!(f, "monitor-sleep"),
            FaultCategory::EncoderFailure => write!(f, "encoder-failure"),
            FaultCategory::LogCorruption => write!(f, "log-corruption"),
        }
    }
}

/// Unordered set of trigger substrings for one category
///
/// Empty strings are dropped since they would match every line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = Vec::<String>::new();
        for pattern in patterns {
            if !pattern.is_empty() && !set.iter().any(|p| p == pattern) {
                set.push(pattern.to_string());
            }
        }
        Self { patterns: set }
    }

    /// True if any pattern occurs in `line`
    pub fn matches(&self, line: &str) -> bool {
        self.patterns.iter().any(|p| line.contains(p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }
}

/// A fault occurrence found during one scan pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub category: FaultCategory,
    pub occurred_at: DateTime<Local>,
    pub raw_line: String,
}

/// Outcome of classifying one category against the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A strictly newer occurrence than the last handled one
    Triggered(ErrorEvent),
    /// Occurrences exist but none is newer than `last_handled`
    AlreadyHandled { last_handled: DateTime<Local> },
    /// No matching line carried a usable timestamp
    NotFound,
    /// The scan hit an over-long line; the log must be cleared
    CorruptionDetected,
}

impl Verdict {
    pub fn is_triggered(&self) -> bool {
        matches!(self, Verdict::Triggered(_))
    }

    /// The last-handled timestamp after applying this verdict
    pub fn last_handled(&self, previous: Option<DateTime<Local>>) -> Option<DateTime<Local>> {
        match self {
            Verdict::Triggered(event) => Some(event.occurred_at),
            _ => previous,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("cannot access log {path}: {source}")]
    LogAccess { path: PathBuf, source: io::Error },
}

/// Latest timestamped match found in one pass over the log
#[derive(Debug, Default)]
pub(crate) struct LatestMatch {
    pub at: Option<DateTime<Local>>,
    pub line: Option<String>,
    pub matched: usize,
    pub untimed: usize,
    pub corrupted: bool,
}

/// Scan the whole log, tracking the latest timestamp among lines accepted by `is_match`
///
/// The file is opened and closed within the call.
pub(crate) fn scan_latest(
    path: &Path,
    mut is_match: impl FnMut(&str) -> bool,
) -> Result<LatestMatch, ClassifyError> {
    let access = |source| ClassifyError::LogAccess {
        path: path.to_path_buf(),
        source,
    };
    let scanner = LineScanner::open(path).map_err(access)?;

    let mut latest = LatestMatch::default();
    for line in scanner {
        let line = match line {
            Ok(line) => line,
            Err(ScanError::LineTooLong { limit }) => {
                warn!(path = %path.display(), limit, "log line exceeds scan limit");
                latest.corrupted = true;
                break;
            }
            Err(ScanError::Io(e)) => return Err(access(e)),
        };

        if !is_match(&line) {
            continue;
        }
        latest.matched += 1;

        match parse_log_timestamp(&line) {
            Ok(at) => {
                if latest.at.map_or(true, |current| at > current) {
                    latest.at = Some(at);
                    latest.line = Some(line);
                }
            }
            Err(e) => {
                latest.untimed += 1;
                debug!(error = %e, "skipping matched line without timestamp");
            }
        }
    }

    Ok(latest)
}

/// Classify `category` by scanning `path` for any of `patterns`
///
/// Only a timestamp strictly later than `last_handled` triggers, so running
/// this again over unchanged content never triggers twice.
pub fn classify(
    path: &Path,
    category: FaultCategory,
    patterns: &PatternSet,
    last_handled: Option<DateTime<Local>>,
) -> Result<Verdict, ClassifyError> {
    let latest = scan_latest(path, |line| patterns.matches(line))?;

    if latest.corrupted {
        return Ok(Verdict::CorruptionDetected);
    }

    let (Some(occurred_at), Some(raw_line)) = (latest.at, latest.line) else {
        if latest.untimed > 0 {
            warn!(
                %category,
                matched = latest.matched,
                "pattern matched but no line carried a timestamp"
            );
        } else {
            debug!(%category, "no occurrences");
        }
        return Ok(Verdict::NotFound);
    };

    match last_handled {
        Some(handled) if occurred_at <= handled => {
            debug!(%category, last_handled = %handled.to_rfc3339(), "already handled");
            Ok(Verdict::AlreadyHandled {
                last_handled: handled,
            })
        }
        _ => {
            info!(
                %category,
                occurred_at = %occurred_at.to_rfc3339(),
                matched = latest.matched,
                "fault detected"
            );
            Ok(Verdict::Triggered(ErrorEvent {
                category,
                occurred_at,
                raw_line,
            }))
        }
    }
}

/// Stateful classifier owning the log cursor and per-category dedup state
///
/// State is transient and starts empty on every launch.
#[derive(Debug)]
pub struct Classifier {
    cursor: LogCursor,
    last_handled: HashMap<FaultCategory, DateTime<Local>>,
}

impl Classifier {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            cursor: LogCursor::new(log_path),
            last_handled: HashMap::new(),
        }
    }

    pub fn log_path(&self) -> &Path {
        self.cursor.path()
    }

    pub fn last_handled(&self, category: FaultCategory) -> Option<DateTime<Local>> {
        self.last_handled.get(&category).copied()
    }

    /// Forget every handled timestamp
    pub fn reset(&mut self) {
        self.last_handled.clear();
    }

    /// Check one category, resetting dedup state first if the log shrank
    pub fn check(
        &mut self,
        category: FaultCategory,
        patterns: &PatternSet,
    ) -> Result<Verdict, ClassifyError> {
        let observation = self
            .cursor
            .observe()
            .map_err(|source| ClassifyError::LogAccess {
                path: self.cursor.path().to_path_buf(),
                source,
            })?;

        if observation.rotated() {
            info!(
                previous_size = observation.previous_size,
                size = observation.size,
                "log appears to have rotated; resetting tracking state"
            );
            self.reset();
        }

        let previous = self.last_handled(category);
        let verdict = classify(self.cursor.path(), category, patterns, previous)?;
        if let Some(at) = verdict.last_handled(previous) {
            self.last_handled.insert(category, at);
        }
        Ok(verdict)
    }
}
