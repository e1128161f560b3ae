//! KubeML CLI client.
//!
//! Wraps the three `kubeml` invocations the experiment workflow needs:
//! starting a training task, listing running tasks, and fetching the
//! history of a finished network.

use crate::command::{CommandOutput, CommandRunner, FailurePolicy, SystemCommandRunner};
use crate::error::Result;
use crate::poll::TaskLister;
use crate::types::{History, TrainRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_BINARY: &str = "kubeml";

/// Client for the `kubeml` command-line tool.
#[derive(Clone)]
pub struct KubemlClient {
    binary: String,
    runner: Arc<dyn CommandRunner>,
    policy: FailurePolicy,
}

impl std::fmt::Debug for KubemlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubemlClient")
            .field("binary", &self.binary)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for KubemlClient {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl KubemlClient {
    /// Create a client that spawns real `binary` processes.
    pub fn new(binary: impl Into<String>) -> Self {
        Self::with_runner(binary, Arc::new(SystemCommandRunner))
    }

    /// Create a client over an arbitrary command runner.
    pub fn with_runner(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    async fn invoke(&self, args: Vec<String>) -> Result<CommandOutput> {
        let output = self.runner.run(&self.binary, &args).await?;
        self.policy.check(output)
    }

    /// Start a training task and return the network id KubeML assigns.
    pub async fn start_training(&self, request: &TrainRequest) -> Result<String> {
        let args = train_args(request);
        info!(
            function = %request.function_name,
            dataset = %request.dataset,
            epochs = request.epochs,
            batch = request.batch_size,
            lr = request.lr,
            "Starting training"
        );

        let output = self.invoke(args).await?;
        let id = output.stdout.trim_end().to_string();
        if id.is_empty() {
            warn!("start-training printed no run id");
        }
        info!(run_id = %id, "Received run id");
        Ok(id)
    }

    /// Ids of the tasks currently running, one per output line.
    pub async fn list_running(&self) -> Result<Vec<String>> {
        let output = self.invoke(strings(&["task", "list", "--short"])).await?;
        let tasks = parse_task_list(&output.stdout);
        debug!(count = tasks.len(), "Listed running tasks");
        Ok(tasks)
    }

    /// Fetch and parse the training history of a network.
    pub async fn get_history(&self, run_id: &str) -> Result<History> {
        info!(run_id = %run_id, "Fetching model history");
        let output = self
            .invoke(strings(&["history", "get", "--network", run_id]))
            .await?;
        debug!(raw = %output.stdout.trim_end(), "Got history");
        Ok(History::from_json(&output.stdout)?)
    }
}

#[async_trait]
impl TaskLister for KubemlClient {
    async fn running_tasks(&self) -> Result<Vec<String>> {
        self.list_running().await
    }
}

/// Arguments for `kubeml train`.
pub fn train_args(request: &TrainRequest) -> Vec<String> {
    vec![
        "train".to_string(),
        "--function".to_string(),
        request.function_name.clone(),
        "--dataset".to_string(),
        request.dataset.clone(),
        "--epochs".to_string(),
        request.epochs.to_string(),
        "--batch".to_string(),
        request.batch_size.to_string(),
        "--lr".to_string(),
        request.lr.to_string(),
    ]
}

/// Split `task list --short` output into ids, dropping blank lines.
pub fn parse_task_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
