//! Direct strategy: configured stop/start commands plus the process table

use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use super::command::{parse_command_line, run_command_line};
use super::table::ProcessTable;
use super::{ControlError, ProcessController};

/// Controls the supervised process without a service manager
///
/// Started children are waited on by a detached reaper thread so no
/// defunct entry is left behind when they exit.
pub struct DirectController {
    stop_command: String,
    start_command: String,
    table: Arc<dyn ProcessTable>,
}

impl DirectController {
    pub fn new(
        stop_command: impl Into<String>,
        start_command: impl Into<String>,
        table: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            stop_command: stop_command.into(),
            start_command: start_command.into(),
            table,
        }
    }

    /// Launch the start command and hand the child to a reaper thread
    ///
    /// Returns the child's pid.
    pub fn spawn_start_command(&self) -> Result<u32, ControlError> {
        let (program, args) = parse_command_line(&self.start_command)?;
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ControlError::Spawn {
                command: self.start_command.clone(),
                source,
            })?;

        let pid = child.id();
        thread::Builder::new()
            .name(format!("reaper-{pid}"))
            .spawn(move || match child.wait() {
                Ok(status) => info!(pid, %status, "started process exited"),
                Err(e) => warn!(pid, error = %e, "failed to wait on started process"),
            })
            .map_err(|source| ControlError::Spawn {
                command: self.start_command.clone(),
                source,
            })?;

        info!(pid, command = %self.start_command, "started process directly");
        Ok(pid)
    }
}

impl ProcessController for DirectController {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn stop(&self) -> Result<(), ControlError> {
        run_command_line(&self.stop_command).map(|_| ())
    }

    fn start(&self) -> Result<(), ControlError> {
        self.spawn_start_command().map(|_| ())
    }

    fn is_running(&self) -> bool {
        !self.table.matching_pids().is_empty()
    }
}
