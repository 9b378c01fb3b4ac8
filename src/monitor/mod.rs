//! Log monitoring for the supervised streaming host
//!
//! Scans the host's log for known fault signatures, deduplicates occurrences
//! by their timestamps and detects truncation or rotation of the log file.

mod classifier;
mod cursor;
mod readiness;
mod scanner;
mod timestamp;


pub use classifier::{
    classify, Classifier, ClassifyError, ErrorEvent, FaultCategory, PatternSet, Verdict,
};
pub use cursor::{CursorObservation, LogCursor};
pub use readiness::find_ready_marker;
pub use scanner::{LineScanner, ScanError, MAX_LINE_LENGTH};
pub use timestamp::{parse_log_timestamp, TimestampError};
