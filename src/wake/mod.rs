//! Display wake handling
//!
//! The wake cycle runs on its own thread next to the periodic log tick.
//! Both sides share [`SharedWakeState`]; the `in_wake_cycle` flag is only
//! ever set through [`SharedWakeState::begin_wake_cycle`] so that it is
//! cleared on every exit path.

mod controller;
mod state;
mod waker;


pub use controller::{CycleReport, WakeAction, WakeCycleController};
pub use state::{SharedWakeState, WakeCycleGuard, WakeDecision, WakeState};
pub use waker::{CommandWaker, DisplayWaker, WakeError};

use crate::restart::{RestartCoordinator, RestartError, RestartReport};

/// Restart the host and forget wake state tied to the old instance
///
/// The log was truncated by the restart, so the activity cursor and the
/// last ready time no longer describe anything.
pub fn restart_and_note(
    restarter: &RestartCoordinator,
    state: &SharedWakeState,
) -> Result<RestartReport, RestartError> {
    let result = restarter.restart();
    state.lock().note_restart();
    result
}
