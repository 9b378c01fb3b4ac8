//! Continuously running wake-on-connect loop

use chrono::Local;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::monitor::find_ready_marker;
use crate::process::ControllerSelector;
use crate::restart::RestartCoordinator;

use super::state::{SharedWakeState, WakeDecision};
use super::waker::DisplayWaker;
use super::restart_and_note;

/// What one iteration of the wake loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeAction {
    /// The host was not running and a restart was attempted
    RestartedDeadProcess { ok: bool },
    Skipped(WakeDecision),
    /// Another wake cycle holds the flag
    WakeInProgress,
    /// A wake was performed; `ready` tells whether the marker appeared
    Woke { ready: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub action: WakeAction,
    /// The host died while a wake cycle was in progress and was restarted
    pub crash_restart: bool,
    /// How long to pause before the next iteration
    pub pause: Duration,
}

pub struct WakeCycleController {
    config: Arc<Config>,
    state: Arc<SharedWakeState>,
    restarter: Arc<RestartCoordinator>,
    selector: Arc<dyn ControllerSelector>,
    waker: Arc<dyn DisplayWaker>,
}

impl WakeCycleController {
    pub fn new(
        config: Arc<Config>,
        state: Arc<SharedWakeState>,
        restarter: Arc<RestartCoordinator>,
        selector: Arc<dyn ControllerSelector>,
        waker: Arc<dyn DisplayWaker>,
    ) -> Self {
        Self {
            config,
            state,
            restarter,
            selector,
            waker,
        }
    }

    /// Loop forever
    pub fn run(&self) -> ! {
        info!(
            cooldown_secs = self.config.wake_cooldown_seconds,
            settle_secs = self.config.wake_monitor_sleep_seconds,
            "wake cycle started"
        );
        loop {
            let report = self.step();
            thread::sleep(report.pause);
        }
    }

    /// One iteration, without the trailing pause
    pub fn step(&self) -> CycleReport {
        let controller = self.selector.select();

        if !controller.is_running() {
            warn!(controller = controller.name(), "process not running; restarting");
            let ok = self.restart();
            return CycleReport {
                action: WakeAction::RestartedDeadProcess { ok },
                crash_restart: false,
                pause: self.config.dead_process_retry(),
            };
        }

        let action = self.maybe_wake();

        let crash_restart = self.state.in_wake_cycle() && !controller.is_running();
        if crash_restart {
            warn!("process crashed during wake cycle; restarting");
            self.restart();
        }

        let pause = if self.state.lock().log_activity() {
            self.config.activity_pause()
        } else {
            self.config.check_interval()
        };

        CycleReport {
            action,
            crash_restart,
            pause,
        }
    }

    fn maybe_wake(&self) -> WakeAction {
        let decision = self
            .state
            .lock()
            .wake_decision(Local::now(), self.config.wake_cooldown());
        match decision {
            WakeDecision::Proceed => {}
            WakeDecision::RecentlyReady => {
                info!("recently ready; skipping wake");
                return WakeAction::Skipped(decision);
            }
            WakeDecision::CoolingDown => {
                info!("in cooldown period; skipping wake");
                return WakeAction::Skipped(decision);
            }
        }

        let Some(_cycle) = self.state.begin_wake_cycle() else {
            info!("wake cycle already in progress; skipping wake");
            return WakeAction::WakeInProgress;
        };

        info!("waking monitor for connection");
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "could not wake monitor");
        }
        self.state.record_wake();

        let settle = self.config.wake_settle();
        info!(secs = settle.as_secs(), "waiting for monitor and host");
        thread::sleep(settle);

        if self.check_ready() {
            info!("host is ready; connection successful");
            WakeAction::Woke { ready: true }
        } else {
            warn!("host not ready; restarting");
            self.restart();
            WakeAction::Woke { ready: false }
        }
    }

    /// Look for the ready marker, remembering when it was logged
    fn check_ready(&self) -> bool {
        match find_ready_marker(&self.config.sunshine_log_path, &self.config.ready_log_line) {
            Ok(Some(at)) => {
                self.state.lock().last_ready = Some(at);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "log unavailable; treating host as not ready");
                false
            }
        }
    }

    fn restart(&self) -> bool {
        match restart_and_note(&self.restarter, &self.state) {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "restart failed; waiting for next cycle");
                false
            }
        }
    }
}
