//! External command invocation.
//!
//! Every call to the platform CLI goes through a [`CommandRunner`], which
//! captures stdout and stderr separately. Whether a finished command counts
//! as failed is decided by a [`FailurePolicy`], applied uniformly after
//! each invocation.

use crate::error::{ExperimentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Human-readable command line, used in error reports.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a program to completion and captures its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let command = render_command(program, args);
        debug!(command = %command, "Spawning command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExperimentError::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = CommandOutput {
            command,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        };
        debug!(
            exit_code = ?output.exit_code,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "Command finished"
        );
        Ok(output)
    }
}

/// Rule deciding whether a finished command failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any output on stderr is a failure, whatever the exit code.
    #[default]
    AnyStderr,
    /// Only a non-zero (or missing) exit code is a failure; stderr is logged.
    NonZeroExit,
}

impl FailurePolicy {
    /// Pass the output through, or turn it into `CommandFailed`.
    pub fn check(self, output: CommandOutput) -> Result<CommandOutput> {
        let failed = match self {
            Self::AnyStderr => !output.stderr.is_empty(),
            Self::NonZeroExit => !output.success(),
        };
        if failed {
            let stderr = if output.stderr.is_empty() {
                format!("exited with status {:?}", output.exit_code)
            } else {
                output.stderr.trim_end().to_string()
            };
            return Err(ExperimentError::command_failed(output.command, stderr));
        }
        if !output.stderr.is_empty() {
            tracing::warn!(command = %output.command, stderr = %output.stderr.trim_end(), "Command wrote to stderr");
        }
        Ok(output)
    }
}

/// Join a program and its arguments into a single display string.
pub fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
