//! Supervisor configuration
//!
//! Loaded once at startup from a TOML file and shared read-only for the
//! lifetime of the process. Keys are PascalCase to stay compatible with
//! existing `sunrise.cfg` files.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::monitor::{FaultCategory, PatternSet};
use crate::restart::RestartTimings;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sunrise/sunrise.cfg";

/// Marker the streaming host logs once it is ready to accept connections
pub const DEFAULT_READY_LOG_LINE: &str = "Starting main loop";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_check_seconds")]
    pub sunrise_check_seconds: u64,
    pub sunshine_log_path: PathBuf,

    #[serde(default)]
    pub monitor_is_off_log_line: String,
    #[serde(default)]
    pub encoder_failed_log_line: String,
    #[serde(default)]
    pub encoder_failed_log_line2: String,
    #[serde(default)]
    pub encoder_failed_log_lines: Vec<String>,

    #[serde(default = "default_wake_sleep_seconds")]
    pub wake_monitor_sleep_seconds: u64,
    #[serde(default)]
    pub wake_monitor_command: String,
    #[serde(default = "default_alternative_wake_commands")]
    pub alternative_wake_commands: Vec<String>,

    #[serde(default)]
    pub stop_sunshine_command: String,
    #[serde(default)]
    pub start_sunshine_command: String,

    #[serde(default)]
    pub enable_sunshine_restart: bool,
    #[serde(default)]
    pub restart_on_encoder_failure: bool,

    #[serde(default = "default_sunshine_name")]
    pub service_name: String,
    #[serde(default = "default_sunshine_name")]
    pub process_name: String,
    #[serde(default = "default_ready_log_line")]
    pub ready_log_line: String,

    #[serde(default = "default_wake_cooldown_seconds")]
    pub wake_cooldown_seconds: u64,
    #[serde(default = "default_activation_timeout_seconds")]
    pub service_activation_timeout_seconds: u64,
    #[serde(default = "default_restart_grace_seconds")]
    pub restart_grace_seconds: u64,
    #[serde(default = "default_reap_interval_seconds")]
    pub reap_interval_seconds: u64,
    #[serde(default = "default_termination_wait_seconds")]
    pub termination_wait_seconds: u64,
    #[serde(default = "default_verify_clear_seconds")]
    pub verify_clear_seconds: u64,
    #[serde(default = "default_startup_settle_seconds")]
    pub startup_settle_seconds: u64,
    #[serde(default = "default_dead_process_retry_seconds")]
    pub dead_process_retry_seconds: u64,
    #[serde(default = "default_activity_pause_millis")]
    pub activity_pause_millis: u64,
}

fn default_check_seconds() -> u64 {
    5
}

fn default_wake_sleep_seconds() -> u64 {
    15
}

fn default_alternative_wake_commands() -> Vec<String> {
    vec![
        "ydotool mousemove --absolute 100 100".to_string(),
        "ydotool key 65".to_string(),
    ]
}

fn default_sunshine_name() -> String {
    "sunshine".to_string()
}

fn default_ready_log_line() -> String {
    DEFAULT_READY_LOG_LINE.to_string()
}

fn default_wake_cooldown_seconds() -> u64 {
    120
}

fn default_activation_timeout_seconds() -> u64 {
    30
}

fn default_restart_grace_seconds() -> u64 {
    3
}

fn default_reap_interval_seconds() -> u64 {
    2
}

fn default_termination_wait_seconds() -> u64 {
    5
}

fn default_verify_clear_seconds() -> u64 {
    2
}

fn default_startup_settle_seconds() -> u64 {
    2
}

fn default_dead_process_retry_seconds() -> u64 {
    10
}

fn default_activity_pause_millis() -> u64 {
    500
}

impl Config {
    /// Load and validate the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sunshine_log_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "SunshineLogPath must not be empty".to_string(),
            ));
        }
        if self.sunrise_check_seconds == 0 {
            return Err(ConfigError::Invalid(
                "SunriseCheckSeconds must be greater than zero".to_string(),
            ));
        }
        if self.process_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ProcessName must not be empty".to_string(),
            ));
        }
        if self.restart_on_encoder_failure
            && self.patterns(FaultCategory::EncoderFailure).is_empty()
        {
            return Err(ConfigError::Invalid(
                "RestartOnEncoderFailure requires at least one EncoderFailedLogLine".to_string(),
            ));
        }
        Ok(())
    }

    /// Trigger substrings configured for a fault category
    ///
    /// Log corruption is detected structurally and has no patterns.
    pub fn patterns(&self, category: FaultCategory) -> PatternSet {
        match category {
            FaultCategory::MonitorSleep => PatternSet::new([self.monitor_is_off_log_line.as_str()]),
            FaultCategory::EncoderFailure => PatternSet::new(
                [
                    self.encoder_failed_log_line.as_str(),
                    self.encoder_failed_log_line2.as_str(),
                ]
                .into_iter()
                .chain(self.encoder_failed_log_lines.iter().map(String::as_str)),
            ),
            FaultCategory::LogCorruption => PatternSet::default(),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.sunrise_check_seconds)
    }

    pub fn wake_settle(&self) -> Duration {
        Duration::from_secs(self.wake_monitor_sleep_seconds)
    }

    pub fn wake_cooldown(&self) -> Duration {
        Duration::from_secs(self.wake_cooldown_seconds)
    }

    pub fn activation_timeout(&self) -> Duration {
        Duration::from_secs(self.service_activation_timeout_seconds)
    }

    pub fn dead_process_retry(&self) -> Duration {
        Duration::from_secs(self.dead_process_retry_seconds)
    }

    pub fn activity_pause(&self) -> Duration {
        Duration::from_millis(self.activity_pause_millis)
    }

    pub fn restart_timings(&self) -> RestartTimings {
        RestartTimings {
            grace: Duration::from_secs(self.restart_grace_seconds),
            reap_interval: Duration::from_secs(self.reap_interval_seconds),
            termination_wait: Duration::from_secs(self.termination_wait_seconds),
            verify_clear: Duration::from_secs(self.verify_clear_seconds),
            startup_settle: Duration::from_secs(self.startup_settle_seconds),
        }
    }
}
