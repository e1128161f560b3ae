//! Waiting for a run to leave the running task list.

use crate::config::PollingConfig;
use crate::error::{ExperimentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Source of the ids of currently running tasks.
#[async_trait]
pub trait TaskLister: Send + Sync {
    async fn running_tasks(&self) -> Result<Vec<String>>;
}

/// How to treat a run id that is absent on the very first poll.
///
/// An id missing from the first listing may belong to a run that finished
/// before the first check or to one that never existed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRunPolicy {
    /// Absent means finished, whether or not the run was ever seen.
    #[default]
    TreatAsFinished,
    /// The run must appear at least once, otherwise `NotFound`.
    RequireSeen,
}

/// Summary of a completed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Number of listings performed, including the final one.
    pub attempts: u32,
    /// Whether the run appeared in at least one listing.
    pub seen_running: bool,
    pub elapsed: Duration,
}

/// Repeatedly lists running tasks until a run id disappears.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_attempts: Option<u32>,
    deadline: Option<Duration>,
    missing_run: MissingRunPolicy,
    cancel: CancellationToken,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Poller {
    /// Poll forever at `interval` until the run finishes.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
            missing_run: MissingRunPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            max_attempts: config.max_attempts,
            deadline: config.timeout_secs.map(Duration::from_secs),
            missing_run: config.missing_run,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_missing_run(mut self, policy: MissingRunPolicy) -> Self {
        self.missing_run = policy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts an in-progress wait when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until `run_id` is absent from the listing.
    pub async fn wait_until_finished(
        &self,
        lister: &dyn TaskLister,
        run_id: &str,
    ) -> Result<PollOutcome> {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut seen_running = false;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ExperimentError::Cancelled(run_id.to_string()));
            }

            attempts += 1;
            let running = lister.running_tasks().await?;
            debug!(run_id = %run_id, attempt = attempts, running = running.len(), "Checked running tasks");

            if !running.iter().any(|id| id == run_id) {
                if !seen_running && self.missing_run == MissingRunPolicy::RequireSeen {
                    return Err(ExperimentError::NotFound(run_id.to_string()));
                }
                info!(run_id = %run_id, attempts, "Task finished");
                return Ok(PollOutcome {
                    attempts,
                    seen_running,
                    elapsed: start.elapsed(),
                });
            }
            seen_running = true;

            let elapsed = start.elapsed();
            let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
            let past_deadline = self.deadline.is_some_and(|d| elapsed >= d);
            if out_of_attempts || past_deadline {
                return Err(ExperimentError::Timeout {
                    run_id: run_id.to_string(),
                    attempts,
                    elapsed,
                });
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(ExperimentError::Cancelled(run_id.to_string()));
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
