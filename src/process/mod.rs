//! Control of the supervised streaming host process
//!
//! Two strategies share one contract: a systemd user unit (preferred) and
//! configured stop/start commands backed by the process table (fallback).
//! The strategy is chosen afresh for every restart attempt since the user
//! session can appear or disappear between attempts.

mod command;
mod direct;
mod systemd;
mod table;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

pub use command::{parse_command_line, run_command, run_command_line};
pub use direct::DirectController;
pub use systemd::{user_session_available, ServiceManagerController, ACTIVATION_POLL_INTERVAL};
pub use table::{ProcFsTable, ProcessTable};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no command configured")]
    EmptyCommand,
    #[error("invalid command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },
    #[error("failed to run '{command}': {source}")]
    Spawn { command: String, source: io::Error },
    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal {
        pid: u32,
        signal: Signal,
        source: Errno,
    },
    #[error("service {service} did not become active within {}s", .timeout.as_secs())]
    ActivationTimeout { service: String, timeout: Duration },
}

/// Uniform stop/start/liveness contract over both strategies
pub trait ProcessController: Send + Sync {
    /// Short strategy name for logs
    fn name(&self) -> &'static str;

    fn stop(&self) -> Result<(), ControlError>;

    fn start(&self) -> Result<(), ControlError>;

    fn is_running(&self) -> bool;
}

/// Picks the controller to use for one attempt
pub trait ControllerSelector: Send + Sync {
    fn select(&self) -> Box<dyn ProcessController>;
}

/// Prefers the systemd user unit when the user session is usable
pub struct SessionAwareSelector {
    config: Arc<Config>,
    table: Arc<dyn ProcessTable>,
}

impl SessionAwareSelector {
    pub fn new(config: Arc<Config>, table: Arc<dyn ProcessTable>) -> Self {
        Self { config, table }
    }
}

impl ControllerSelector for SessionAwareSelector {
    fn select(&self) -> Box<dyn ProcessController> {
        if user_session_available() {
            debug!(service = %self.config.service_name, "using service manager");
            Box::new(ServiceManagerController::new(
                self.config.service_name.clone(),
                self.config.activation_timeout(),
            ))
        } else {
            debug!("user session unavailable; using direct commands");
            Box::new(DirectController::new(
                self.config.stop_sunshine_command.clone(),
                self.config.start_sunshine_command.clone(),
                Arc::clone(&self.table),
            ))
        }
    }
}
