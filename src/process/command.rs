//! Execution of external commands
//!
//! All commands run synchronously and block the calling thread until they
//! exit. There is no timeout around them.

use std::process::{Command, Output};
use tracing::debug;

use super::ControlError;

/// Split a configured command line into program and arguments
pub fn parse_command_line(command_line: &str) -> Result<(String, Vec<String>), ControlError> {
    let mut tokens = shell_words::split(command_line).map_err(|e| ControlError::InvalidCommand {
        command: command_line.to_string(),
        reason: e.to_string(),
    })?;

    if tokens.is_empty() {
        return Err(ControlError::EmptyCommand);
    }

    let program = tokens.remove(0);
    Ok((program, tokens))
}

/// Run `program` to completion, failing on a non-zero exit status
pub fn run_command(program: &str, args: &[&str]) -> Result<Output, ControlError> {
    let rendered = render(program, args);
    debug!(command = %rendered, "running command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ControlError::Spawn {
            command: rendered.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ControlError::CommandFailed {
            command: rendered,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Parse and run a configured command line to completion
pub fn run_command_line(command_line: &str) -> Result<Output, ControlError> {
    let (program, args) = parse_command_line(command_line)?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run_command(&program, &args)
}

fn render(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
