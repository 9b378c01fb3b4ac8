//! Bounded line reader for the monitored log
//!
//! A healthy log is plain text with short lines. When the streaming host
//! writes garbled or binary output the log can contain a "line" of many
//! megabytes; the scanner refuses to buffer past [`MAX_LINE_LENGTH`] and
//! reports [`ScanError::LineTooLong`] so the caller can clear the log
//! instead of treating it as an ordinary I/O failure.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Longest line accepted before the log is considered corrupted (1 MiB)
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("log line exceeds {limit} bytes without a terminator")]
    LineTooLong { limit: usize },
    #[error("failed to read log: {0}")]
    Io(#[from] io::Error),
}

/// Lazy sequence of log lines with a per-line length bound
///
/// Yields lines without their terminator. Invalid UTF-8 is replaced rather
/// than rejected. After the first error the scanner is exhausted.
pub struct LineScanner<R> {
    reader: R,
    limit: usize,
    buf: Vec<u8>,
    done: bool,
}

impl LineScanner<BufReader<File>> {
    /// Open `path` for scanning with the default line bound
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LineScanner<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_LINE_LENGTH)
    }

    pub fn with_limit(reader: R, limit: usize) -> Self {
        Self {
            reader,
            limit,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineScanner<R> {
    type Item = Result<String, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        // The bound covers only line content; two extra bytes leave room
        // for a `\r\n` terminator after a line of exactly `limit` bytes.
        let bound = self.limit as u64 + 2;
        let read = (&mut self.reader)
            .take(bound)
            .read_until(b'\n', &mut self.buf);

        match read {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                if self.buf.len() > self.limit {
                    self.done = true;
                    return Some(Err(ScanError::LineTooLong { limit: self.limit }));
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => {
                self.done = true;
                Some(Err(ScanError::Io(e)))
            }
        }
    }
}
