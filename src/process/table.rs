//! Process table access: enumeration by executable name and signal delivery
//!
//! Identity is established by comparing `/proc/<pid>/comm` to the configured
//! executable name. This is approximate: an unrelated process with the same
//! name is indistinguishable from the supervised one. Results are never
//! cached; every query reads the process table afresh.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::command::run_command;
use super::ControlError;

/// Live view of the processes that belong to the supervised executable
pub trait ProcessTable: Send + Sync {
    /// Identifiers of all processes currently matching the executable name
    fn matching_pids(&self) -> Vec<u32>;

    /// Deliver `signal` to `pid`
    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ControlError>;

    /// Last-resort unconditional kill of every process with the executable name
    fn kill_all(&self) -> Result<(), ControlError>;
}

/// [`ProcessTable`] backed by procfs
#[derive(Debug, Clone)]
pub struct ProcFsTable {
    process_name: String,
    proc_root: PathBuf,
}

impl ProcFsTable {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self::with_root(process_name, "/proc")
    }

    /// Read process entries from `proc_root` instead of `/proc`
    pub fn with_root(process_name: impl Into<String>, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            process_name: process_name.into(),
            proc_root: proc_root.into(),
        }
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }
}

impl ProcessTable for ProcFsTable {
    fn matching_pids(&self) -> Vec<u32> {
        let entries = match fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.proc_root.display(), error = %e, "could not read process table");
                return Vec::new();
            }
        };

        let mut pids: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| {
                let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
                // Processes can exit between listing and reading comm.
                let comm = fs::read_to_string(entry.path().join("comm")).ok()?;
                (comm.trim() == self.process_name).then_some(pid)
            })
            .collect();
        pids.sort_unstable();
        pids
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ControlError> {
        let raw = i32::try_from(pid).map_err(|_| ControlError::Signal {
            pid,
            signal,
            source: Errno::EINVAL,
        })?;

        match kill(Pid::from_raw(raw), signal) {
            Ok(()) => Ok(()),
            // Already gone; nothing left to terminate.
            Err(Errno::ESRCH) => {
                debug!(pid, %signal, "process exited before signal");
                Ok(())
            }
            Err(source) => Err(ControlError::Signal { pid, signal, source }),
        }
    }

    fn kill_all(&self) -> Result<(), ControlError> {
        run_command("killall", &["-9", self.process_name.as_str()]).map(|_| ())
    }
}
