//! Service-manager strategy via the user-session `systemctl`

use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::command::run_command;
use super::{ControlError, ProcessController};

/// Interval between `is-active` polls while waiting for activation
pub const ACTIVATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Controls the supervised process as a systemd user unit
#[derive(Debug, Clone)]
pub struct ServiceManagerController {
    service: String,
    activation_timeout: Duration,
    poll_interval: Duration,
}

impl ServiceManagerController {
    pub fn new(service: impl Into<String>, activation_timeout: Duration) -> Self {
        Self {
            service: service.into(),
            activation_timeout,
            poll_interval: ACTIVATION_POLL_INTERVAL,
        }
    }

    fn systemctl(&self, verb: &str) -> Result<(), ControlError> {
        run_command("systemctl", &["--user", verb, self.service.as_str()]).map(|_| ())
    }

    /// Whether the unit currently reports `active`
    pub fn is_active(&self) -> bool {
        run_command(
            "systemctl",
            &["--user", "is-active", "--quiet", self.service.as_str()],
        )
        .is_ok()
    }

    fn wait_for_active(&self) -> Result<(), ControlError> {
        info!(
            service = %self.service,
            timeout_secs = self.activation_timeout.as_secs(),
            "waiting for service to become active"
        );
        let deadline = Instant::now() + self.activation_timeout;
        loop {
            if self.is_active() {
                info!(service = %self.service, "service is active");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ControlError::ActivationTimeout {
                    service: self.service.clone(),
                    timeout: self.activation_timeout,
                });
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl ProcessController for ServiceManagerController {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn stop(&self) -> Result<(), ControlError> {
        self.systemctl("stop")
    }

    fn start(&self) -> Result<(), ControlError> {
        self.systemctl("start")?;
        self.wait_for_active()
    }

    fn is_running(&self) -> bool {
        self.is_active()
    }
}

/// Whether a systemd user session is up and able to manage units
///
/// `is-system-running` exits non-zero for a degraded session, so only its
/// output is inspected.
pub fn user_session_available() -> bool {
    if which::which("systemctl").is_err() {
        debug!("systemctl not found on PATH");
        return false;
    }

    match Command::new("systemctl")
        .args(["--user", "is-system-running"])
        .output()
    {
        Ok(output) => {
            let state = String::from_utf8_lossy(&output.stdout);
            let usable = session_state_usable(&state);
            debug!(state = %state.trim(), usable, "user session state");
            usable
        }
        Err(e) => {
            debug!(error = %e, "could not query user session state");
            false
        }
    }
}

fn session_state_usable(state: &str) -> bool {
    matches!(state.trim(), "running" | "degraded")
}
