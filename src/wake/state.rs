//! Wake-cycle state shared between the wake loop and the periodic tick

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::monitor::LogCursor;

/// Whether a display wake should be attempted now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeDecision {
    Proceed,
    /// The host logged its ready marker within the cooldown window
    RecentlyReady,
    /// A wake was already attempted within the cooldown window
    CoolingDown,
}

#[derive(Debug)]
pub struct WakeState {
    pub last_wake: Option<DateTime<Local>>,
    pub last_ready: Option<DateTime<Local>>,
    pub in_wake_cycle: bool,
    activity: LogCursor,
}

impl WakeState {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            last_wake: None,
            last_ready: None,
            in_wake_cycle: false,
            activity: LogCursor::new(log_path),
        }
    }

    pub fn wake_decision(&self, now: DateTime<Local>, cooldown: Duration) -> WakeDecision {
        let cooldown = chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX);
        let within = |at: Option<DateTime<Local>>| {
            at.is_some_and(|at| now.signed_duration_since(at) < cooldown)
        };

        if within(self.last_ready) {
            WakeDecision::RecentlyReady
        } else if within(self.last_wake) {
            WakeDecision::CoolingDown
        } else {
            WakeDecision::Proceed
        }
    }

    /// True if the log grew since the previous call
    pub fn log_activity(&mut self) -> bool {
        self.activity
            .observe()
            .map(|observation| observation.grew())
            .unwrap_or(false)
    }

    /// Forget log position and readiness after the host was restarted
    pub fn note_restart(&mut self) {
        self.activity.reset();
        self.last_ready = None;
    }
}

/// [`WakeState`] behind a mutex
#[derive(Debug)]
pub struct SharedWakeState {
    inner: Mutex<WakeState>,
}

impl SharedWakeState {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(WakeState::new(log_path)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, WakeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn in_wake_cycle(&self) -> bool {
        self.lock().in_wake_cycle
    }

    /// Enter a wake cycle unless one is already running
    ///
    /// The flag is cleared when the returned guard drops.
    pub fn begin_wake_cycle(&self) -> Option<WakeCycleGuard<'_>> {
        let mut state = self.lock();
        if state.in_wake_cycle {
            return None;
        }
        state.in_wake_cycle = true;
        Some(WakeCycleGuard { state: self })
    }

    /// Record a wake attempt at the current time
    pub fn record_wake(&self) {
        self.lock().last_wake = Some(Local::now());
    }
}

pub struct WakeCycleGuard<'a> {
    state: &'a SharedWakeState,
}

impl Drop for WakeCycleGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_wake_cycle = false;
    }
}
