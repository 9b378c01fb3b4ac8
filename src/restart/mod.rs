//! Restart sequence for the supervised process
//!
//! A restart walks eight steps in strict order:
//! stop, grace wait, force reap, termination wait, verify clear, log reset,
//! start and verify running. Failures before the start step are logged and
//! the sequence carries on; the final verification decides success.
//!
//! Process identifiers are re-read from the process table at every step
//! rather than carried over, since orphaned instances from an earlier crash
//! may differ from whatever the stop step acted on.

use nix::sys::signal::Signal;
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::process::{ControlError, ControllerSelector, ProcessController, ProcessTable};


/// Delays between restart steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartTimings {
    /// After stop, for cooperative shutdown
    pub grace: Duration,
    /// Between the graceful and the forced signal while reaping
    pub reap_interval: Duration,
    /// After reaping, for the kernel to finish tearing processes down
    pub termination_wait: Duration,
    /// After the last-resort kill-all
    pub verify_clear: Duration,
    /// Between start and the liveness check
    pub startup_settle: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStep {
    Stop,
    GraceWait,
    ForceReap,
    TerminationWait,
    VerifyClear,
    LogReset,
    Start,
    VerifyRunning,
}

impl fmt::Display for RestartStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestartStep::Stop => "stop",
            RestartStep::GraceWait => "grace-wait",
            RestartStep::ForceReap => "force-reap",
            RestartStep::TerminationWait => "termination-wait",
            RestartStep::VerifyClear => "verify-clear",
            RestartStep::LogReset => "log-reset",
            RestartStep::Start => "start",
            RestartStep::VerifyRunning => "verify-running",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("restart failed: {0}")]
    ActivationTimeout(#[source] ControlError),
    #[error("restart failed: no matching process running after start")]
    RestartFailed,
    #[error("failed to truncate log {path}: {source}")]
    LogReset { path: PathBuf, source: io::Error },
    /// A restart that ran while this request waited failed
    #[error("concurrent restart failed: {0}")]
    Concurrent(String),
}

/// Summary of a successful restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartReport {
    pub controller: &'static str,
    /// Processes found lingering after the stop step
    pub reaped: Vec<u32>,
    /// Whether the last-resort kill-all had to run
    pub escalated: bool,
    /// Processes found after start
    pub running: Vec<u32>,
}

/// Outcome of the most recent sequence, kept for requests that join it
type LastOutcome = Option<Result<RestartReport, String>>;

/// Runs restart sequences, one at a time
///
/// A request that arrives while a sequence is running joins it: once the
/// running sequence finishes, the waiting request returns that outcome
/// instead of restarting the freshly started process again.
pub struct RestartCoordinator {
    log_path: PathBuf,
    timings: RestartTimings,
    selector: Arc<dyn ControllerSelector>,
    table: Arc<dyn ProcessTable>,
    gate: Mutex<LastOutcome>,
    completed: AtomicU64,
}

impl RestartCoordinator {
    pub fn new(
        log_path: impl Into<PathBuf>,
        timings: RestartTimings,
        selector: Arc<dyn ControllerSelector>,
        table: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            log_path: log_path.into(),
            timings,
            selector,
            table,
            gate: Mutex::new(None),
            completed: AtomicU64::new(0),
        }
    }

    /// Run the full restart sequence, or join one already in progress
    pub fn restart(&self) -> Result<RestartReport, RestartError> {
        let seen = self.completed.load(Ordering::SeqCst);
        let mut last = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.completed.load(Ordering::SeqCst) != seen {
            if let Some(outcome) = last.as_ref() {
                info!("restart finished while waiting; joining its outcome");
                return outcome.clone().map_err(RestartError::Concurrent);
            }
        }
        let result = self.run_sequence();
        self.finish(&mut last, &result);
        result
    }

    /// Number of sequences run to completion, successful or not
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn finish(&self, last: &mut LastOutcome, result: &Result<RestartReport, RestartError>) {
        *last = Some(result.as_ref().map(Clone::clone).map_err(ToString::to_string));
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Clear a corrupted log, then run the full restart sequence
    ///
    /// The restart is not attempted if the log cannot be truncated.
    pub fn recover_corrupted_log(&self) -> Result<RestartReport, RestartError> {
        let mut last = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        info!(path = %self.log_path.display(), "truncating corrupted log");
        truncate_log(&self.log_path).map_err(|source| RestartError::LogReset {
            path: self.log_path.clone(),
            source,
        })?;
        info!("log truncated, restarting");
        let result = self.run_sequence();
        self.finish(&mut last, &result);
        result
    }

    fn run_sequence(&self) -> Result<RestartReport, RestartError> {
        let controller = self.selector.select();
        info!(controller = controller.name(), "restarting supervised process");

        self.stop(controller.as_ref());
        self.wait(RestartStep::GraceWait, self.timings.grace);
        let reaped = self.force_reap();
        self.wait(RestartStep::TerminationWait, self.timings.termination_wait);
        let escalated = self.verify_clear();
        self.reset_log();
        self.start(controller.as_ref())?;
        let running = self.verify_running()?;

        info!(controller = controller.name(), pids = ?running, "restart complete");
        Ok(RestartReport {
            controller: controller.name(),
            reaped,
            escalated,
            running,
        })
    }

    fn stop(&self, controller: &dyn ProcessController) {
        info!(step = %RestartStep::Stop, controller = controller.name(), "stopping");
        if let Err(e) = controller.stop() {
            warn!(step = %RestartStep::Stop, error = %e, "stop failed; continuing");
        }
    }

    fn wait(&self, step: RestartStep, delay: Duration) {
        info!(%step, delay_ms = millis(delay), "waiting");
        thread::sleep(delay);
    }

    /// Graceful then forced signal to every matching process
    ///
    /// Returns the processes that were still present after the stop step.
    fn force_reap(&self) -> Vec<u32> {
        let step = RestartStep::ForceReap;
        let pids = self.table.matching_pids();
        if pids.is_empty() {
            info!(%step, "no lingering processes");
            return pids;
        }

        info!(%step, count = pids.len(), pids = ?pids, "sending SIGTERM");
        self.signal_all(&pids, Signal::SIGTERM);
        thread::sleep(self.timings.reap_interval);

        let remaining = self.table.matching_pids();
        if !remaining.is_empty() {
            warn!(%step, count = remaining.len(), pids = ?remaining, "sending SIGKILL");
            self.signal_all(&remaining, Signal::SIGKILL);
        }
        pids
    }

    fn signal_all(&self, pids: &[u32], signal: Signal) {
        for &pid in pids {
            if let Err(e) = self.table.signal(pid, signal) {
                warn!(pid, %signal, error = %e, "signal failed");
            }
        }
    }

    /// Safety net: kill everything by name if anything survived reaping
    fn verify_clear(&self) -> bool {
        let step = RestartStep::VerifyClear;
        let remaining = self.table.matching_pids();
        if remaining.is_empty() {
            info!(%step, "all processes terminated");
            return false;
        }

        warn!(%step, count = remaining.len(), pids = ?remaining, "processes survived; killing all by name");
        if let Err(e) = self.table.kill_all() {
            warn!(%step, error = %e, "kill-all failed");
        }
        thread::sleep(self.timings.verify_clear);
        true
    }

    fn reset_log(&self) {
        let step = RestartStep::LogReset;
        match truncate_log(&self.log_path) {
            Ok(()) => info!(%step, path = %self.log_path.display(), "log cleared"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(%step, path = %self.log_path.display(), "no log to clear")
            }
            Err(e) => warn!(%step, error = %e, "failed to clear log; continuing"),
        }
    }

    fn start(&self, controller: &dyn ProcessController) -> Result<(), RestartError> {
        let step = RestartStep::Start;
        info!(%step, controller = controller.name(), "starting");
        match controller.start() {
            Ok(()) => Ok(()),
            Err(e @ ControlError::ActivationTimeout { .. }) => {
                error!(%step, error = %e, "service did not activate");
                Err(RestartError::ActivationTimeout(e))
            }
            Err(e) => {
                warn!(%step, error = %e, "start reported failure; verifying anyway");
                Ok(())
            }
        }
    }

    fn verify_running(&self) -> Result<Vec<u32>, RestartError> {
        let step = RestartStep::VerifyRunning;
        thread::sleep(self.timings.startup_settle);
        let running = self.table.matching_pids();
        if running.is_empty() {
            error!(%step, "no process running after start");
            return Err(RestartError::RestartFailed);
        }
        info!(%step, count = running.len(), pids = ?running, "process running");
        Ok(running)
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Truncate the log to zero length in place
pub fn truncate_log(path: &Path) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(0)
}
