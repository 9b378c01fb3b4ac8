//! Top-level scheduling
//!
//! The periodic tick runs on the calling thread and owns the classifier
//! outright. The wake cycle runs on a named thread. Everything the two share
//! lives in [`SharedWakeState`] or behind the restart coordinator's gate.


use std::io;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::monitor::{Classifier, ClassifyError, FaultCategory, PatternSet, Verdict};
use crate::process::{ControllerSelector, ProcFsTable, ProcessTable, SessionAwareSelector};
use crate::restart::RestartCoordinator;
use crate::wake::{
    restart_and_note, CommandWaker, DisplayWaker, SharedWakeState, WakeCycleController,
};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    LogAccess(#[from] ClassifyError),
    #[error("failed to spawn wake-cycle thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Something the tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// A fresh encoder failure was found and a restart attempted
    EncoderRestart { ok: bool },
    /// An over-long line was found; the log was cleared and the host restarted
    CorruptionRecovered { ok: bool },
    /// A fresh monitor-sleep line was found and the display woken
    MonitorWoken { restarted: bool },
    /// Monitor sleep was found while a wake cycle was already running
    WakeAlreadyInProgress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub actions: Vec<TickAction>,
}

pub struct Supervisor {
    config: Arc<Config>,
    classifier: Classifier,
    encoder_patterns: PatternSet,
    monitor_patterns: PatternSet,
    state: Arc<SharedWakeState>,
    restarter: Arc<RestartCoordinator>,
    waker: Arc<dyn DisplayWaker>,
    wake_cycle: Arc<WakeCycleController>,
}

impl Supervisor {
    /// Wire up the real process table, controllers and wake commands
    pub fn new(config: Arc<Config>) -> Self {
        let table: Arc<dyn ProcessTable> = Arc::new(ProcFsTable::new(config.process_name.clone()));
        let selector: Arc<dyn ControllerSelector> =
            Arc::new(SessionAwareSelector::new(Arc::clone(&config), Arc::clone(&table)));
        let waker: Arc<dyn DisplayWaker> = Arc::new(CommandWaker::from_config(&config));
        Self::with_components(config, selector, table, waker)
    }

    pub fn with_components(
        config: Arc<Config>,
        selector: Arc<dyn ControllerSelector>,
        table: Arc<dyn ProcessTable>,
        waker: Arc<dyn DisplayWaker>,
    ) -> Self {
        let log_path = config.sunshine_log_path.clone();
        let state = Arc::new(SharedWakeState::new(&log_path));
        let restarter = Arc::new(RestartCoordinator::new(
            &log_path,
            config.restart_timings(),
            Arc::clone(&selector),
            table,
        ));
        let wake_cycle = Arc::new(WakeCycleController::new(
            Arc::clone(&config),
            Arc::clone(&state),
            Arc::clone(&restarter),
            selector,
            Arc::clone(&waker),
        ));

        Self {
            classifier: Classifier::new(log_path),
            encoder_patterns: config.patterns(FaultCategory::EncoderFailure),
            monitor_patterns: config.patterns(FaultCategory::MonitorSleep),
            config,
            state,
            restarter,
            waker,
            wake_cycle,
        }
    }

    pub fn wake_state(&self) -> &Arc<SharedWakeState> {
        &self.state
    }

    /// Start the wake cycle thread, then tick until the log becomes inaccessible
    pub fn run(mut self) -> Result<(), SupervisorError> {
        let wake_cycle = Arc::clone(&self.wake_cycle);
        thread::Builder::new()
            .name("wake-cycle".to_string())
            .spawn(move || {
                wake_cycle.run();
            })
            .map_err(SupervisorError::Spawn)?;

        let interval = self.config.check_interval();
        info!(interval_secs = interval.as_secs(), "periodic checks started");
        loop {
            thread::sleep(interval);
            self.tick()?;
        }
    }

    /// One periodic check
    ///
    /// An inaccessible log is returned as an error; everything else is
    /// handled here and logged.
    pub fn tick(&mut self) -> Result<TickReport, SupervisorError> {
        let mut report = TickReport::default();

        if self.config.restart_on_encoder_failure {
            match self
                .classifier
                .check(FaultCategory::EncoderFailure, &self.encoder_patterns)?
            {
                Verdict::Triggered(event) => {
                    warn!(
                        category = %event.category,
                        occurred_at = %event.occurred_at,
                        line = %event.raw_line,
                        "encoder failure detected; restarting"
                    );
                    let ok = self.restart();
                    report.actions.push(TickAction::EncoderRestart { ok });
                }
                Verdict::CorruptionDetected => {
                    let ok = self.recover_corrupted_log();
                    report.actions.push(TickAction::CorruptionRecovered { ok });
                    return Ok(report);
                }
                Verdict::AlreadyHandled { .. } | Verdict::NotFound => {}
            }
        }

        if !self.monitor_patterns.is_empty() {
            match self
                .classifier
                .check(FaultCategory::MonitorSleep, &self.monitor_patterns)?
            {
                Verdict::Triggered(event) => {
                    warn!(
                        category = %event.category,
                        occurred_at = %event.occurred_at,
                        "monitor sleep detected"
                    );
                    report.actions.push(self.wake_sleeping_monitor());
                }
                Verdict::CorruptionDetected => {
                    let ok = self.recover_corrupted_log();
                    report.actions.push(TickAction::CorruptionRecovered { ok });
                }
                Verdict::AlreadyHandled { .. } | Verdict::NotFound => {}
            }
        }

        Ok(report)
    }

    fn wake_sleeping_monitor(&self) -> TickAction {
        let Some(_cycle) = self.state.begin_wake_cycle() else {
            info!("wake cycle already in progress; leaving monitor to it");
            return TickAction::WakeAlreadyInProgress;
        };

        match self.waker.wake() {
            Ok(method) => info!(method = %method, "monitor woken"),
            Err(e) => warn!(error = %e, "could not wake monitor"),
        }
        self.state.record_wake();
        thread::sleep(self.config.wake_settle());

        let restarted = self.config.enable_sunshine_restart && self.restart();
        TickAction::MonitorWoken { restarted }
    }

    fn restart(&self) -> bool {
        match restart_and_note(&self.restarter, &self.state) {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "restart failed; waiting for next tick");
                false
            }
        }
    }

    fn recover_corrupted_log(&mut self) -> bool {
        warn!(path = %self.classifier.log_path().display(), "log corrupted; recovering");
        let result = self.restarter.recover_corrupted_log();
        self.classifier.reset();
        self.state.lock().note_restart();
        match result {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "corruption recovery failed");
                false
            }
        }
    }
}
