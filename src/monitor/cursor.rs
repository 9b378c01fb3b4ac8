//! Size tracking for the monitored log file

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Result of comparing a fresh stat against the last known size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorObservation {
    pub previous_size: u64,
    pub size: u64,
}

impl CursorObservation {
    /// The file shrank, so it was truncated or rotated since the last look
    pub fn rotated(&self) -> bool {
        self.size < self.previous_size
    }

    /// New bytes were appended since the last look
    pub fn grew(&self) -> bool {
        self.size > self.previous_size
    }
}

/// Tracks the observed size of a log file across scans
#[derive(Debug, Clone)]
pub struct LogCursor {
    path: PathBuf,
    last_known_size: u64,
}

impl LogCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_known_size: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_known_size(&self) -> u64 {
        self.last_known_size
    }

    /// Stat the file and record its current size
    pub fn observe(&mut self) -> io::Result<CursorObservation> {
        let size = fs::metadata(&self.path)?.len();
        let observation = CursorObservation {
            previous_size: self.last_known_size,
            size,
        };
        self.last_known_size = size;
        Ok(observation)
    }

    /// Forget the last known size, e.g. after the log was cleared
    pub fn reset(&mut self) {
        self.last_known_size = 0;
    }
}
