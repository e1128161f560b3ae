//! Experiments: one training request driven to a reported history.
//!
//! A KubeML experiment moves through
//! `Pending -> Submitted -> Polling -> Finished -> Fetched -> Reported`.
//! Any failing step leaves it `Aborted`.

use crate::error::{ExperimentError, Result};
use crate::kubeml::KubemlClient;
use crate::poll::{PollOutcome, Poller};
use crate::report::{ReportFormat, write_history};
use crate::types::{History, TrainRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use tracing::{error, info};

/// Training platform an experiment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Kubeml,
    Tensorflow,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubeml => write!(f, "kubeml"),
            Self::Tensorflow => write!(f, "tensorflow"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kubeml" => Ok(Self::Kubeml),
            "tensorflow" | "tf" => Ok(Self::Tensorflow),
            other => Err(format!("unknown platform '{other}' (expected kubeml or tensorflow)")),
        }
    }
}

/// Lifecycle of a single experiment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Submitted,
    Polling,
    Finished,
    Fetched,
    Reported,
    Aborted,
}

/// A runnable experiment.
#[async_trait]
pub trait Experiment: Send {
    fn title(&self) -> &str;

    fn platform(&self) -> Platform;

    /// Run to completion and write the resulting history to `out`.
    async fn run(&mut self, out: &mut (dyn Write + Send)) -> Result<History>;
}

/// Experiment executed through the KubeML CLI.
#[derive(Debug)]
pub struct KubemlExperiment {
    title: String,
    request: TrainRequest,
    client: KubemlClient,
    poller: Poller,
    format: ReportFormat,
    run_id: Option<String>,
    state: RunState,
}

impl KubemlExperiment {
    pub fn new(title: impl Into<String>, request: TrainRequest, client: KubemlClient) -> Self {
        Self {
            title: title.into(),
            request,
            client,
            poller: Poller::default(),
            format: ReportFormat::default(),
            run_id: None,
            state: RunState::Pending,
        }
    }

    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn request(&self) -> &TrainRequest {
        &self.request
    }

    /// Network id assigned by KubeML, once submitted.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Start the training task and remember its id.
    pub async fn submit(&mut self) -> Result<String> {
        let id = self.client.start_training(&self.request).await?;
        self.run_id = Some(id.clone());
        self.state = RunState::Submitted;
        Ok(id)
    }

    /// Wait until the submitted task is no longer running.
    pub async fn wait_for_finished(&mut self) -> Result<PollOutcome> {
        let id = self.require_run_id()?;
        self.state = RunState::Polling;
        let outcome = self.poller.wait_until_finished(&self.client, &id).await?;
        self.state = RunState::Finished;
        Ok(outcome)
    }

    /// Load the history of the submitted task.
    pub async fn fetch_history(&mut self) -> Result<History> {
        let id = self.require_run_id()?;
        let history = self.client.get_history(&id).await?;
        if history.id != id {
            tracing::warn!(run_id = %id, history_id = %history.id, "History id differs from run id");
        }
        self.state = RunState::Fetched;
        Ok(history)
    }

    fn require_run_id(&self) -> Result<String> {
        self.run_id
            .clone()
            .ok_or_else(|| ExperimentError::config("experiment has not been submitted"))
    }

    async fn run_steps(&mut self, out: &mut (dyn Write + Send)) -> Result<History> {
        self.submit().await?;
        self.wait_for_finished().await?;
        let history = self.fetch_history().await?;
        write_history(out, &history, self.format)?;
        self.state = RunState::Reported;
        Ok(history)
    }
}

#[async_trait]
impl Experiment for KubemlExperiment {
    fn title(&self) -> &str {
        &self.title
    }

    fn platform(&self) -> Platform {
        Platform::Kubeml
    }

    async fn run(&mut self, out: &mut (dyn Write + Send)) -> Result<History> {
        info!(title = %self.title, "Running experiment");
        match self.run_steps(out).await {
            Ok(history) => {
                info!(title = %self.title, run_id = %history.id, epochs = history.data.epochs(), "Experiment reported");
                Ok(history)
            }
            Err(e) => {
                error!(title = %self.title, state = ?self.state, error = %e, "Experiment aborted");
                self.state = RunState::Aborted;
                Err(e)
            }
        }
    }
}

/// Placeholder for TensorFlow-based experiments.
#[derive(Debug, Clone)]
pub struct TensorflowExperiment {
    title: String,
}

impl TensorflowExperiment {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[async_trait]
impl Experiment for TensorflowExperiment {
    fn title(&self) -> &str {
        &self.title
    }

    fn platform(&self) -> Platform {
        Platform::Tensorflow
    }

    async fn run(&mut self, _out: &mut (dyn Write + Send)) -> Result<History> {
        Err(ExperimentError::not_supported(Platform::Tensorflow.to_string()))
    }
}
