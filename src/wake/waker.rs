//! Display wake methods

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::process::run_command_line;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WakeError {
    #[error("no wake method configured")]
    NoMethods,
    #[error("all wake methods failed")]
    AllMethodsFailed,
}

/// Something that can nudge the display out of power saving
pub trait DisplayWaker: Send + Sync {
    /// Returns the method that succeeded
    fn wake(&self) -> Result<String, WakeError>;
}

/// Runs the configured wake command, then alternatives in order
#[derive(Debug, Clone)]
pub struct CommandWaker {
    primary: String,
    alternatives: Vec<String>,
}

impl CommandWaker {
    pub fn new(primary: impl Into<String>, alternatives: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            alternatives,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.wake_monitor_command.clone(),
            config.alternative_wake_commands.clone(),
        )
    }

    fn methods(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str())
            .chain(self.alternatives.iter().map(String::as_str))
            .filter(|command| !command.trim().is_empty())
    }
}

impl DisplayWaker for CommandWaker {
    fn wake(&self) -> Result<String, WakeError> {
        let mut attempted = false;
        for command in self.methods() {
            attempted = true;
            info!(command, "running wake command");
            match run_command_line(command) {
                Ok(_) => {
                    info!(command, "wake command completed");
                    return Ok(command.to_string());
                }
                Err(e) => warn!(command, error = %e, "wake command failed"),
            }
        }

        if attempted {
            Err(WakeError::AllMethodsFailed)
        } else {
            Err(WakeError::NoMethods)
        }
    }
}
