//! Error types for the kubexp-core crate.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for experiment operations.
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// An external command was judged failed by the active `FailurePolicy`.
    #[error("error running command {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("run {0} was never observed in the running task list")]
    NotFound(String),

    #[error("run {run_id} still running after {attempts} polls ({elapsed:?})")]
    Timeout {
        run_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("polling for run {0} was cancelled")]
    Cancelled(String),

    #[error("{0} experiments are not supported")]
    NotSupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ExperimentError {
    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    pub fn not_supported(platform: impl Into<String>) -> Self {
        Self::NotSupported(platform.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error came from the external tool itself rather than
    /// from this process.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::CommandFailed { .. } | Self::Spawn { .. })
    }
}

impl From<figment::Error> for ExperimentError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;
