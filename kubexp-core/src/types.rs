//! Wire types exchanged with the KubeML CLI.
//!
//! Field names follow the JSON documents KubeML emits. Every record keeps
//! the keys it does not recognize in an `extra` map, so a history written
//! by a newer platform version survives a parse/serialize cycle intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unrecognized JSON keys carried alongside a record.
pub type Extra = Map<String, Value>;

/// Scalar settings for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    pub default_parallelism: i64,
    pub static_parallelism: bool,
    pub validate_every: i64,
    /// Number of local steps between model synchronizations.
    #[serde(rename = "K")]
    pub k: i64,
    pub goal_accuracy: f64,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            default_parallelism: 5,
            static_parallelism: false,
            validate_every: 1,
            k: 10,
            goal_accuracy: 100.0,
            extra: Extra::new(),
        }
    }
}

/// One training job as submitted to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub model_type: String,
    pub batch_size: i64,
    pub epochs: i64,
    pub dataset: String,
    pub lr: f64,
    pub function_name: String,
    pub options: TrainOptions,
    #[serde(flatten)]
    pub extra: Extra,
}

impl TrainRequest {
    pub fn new(function_name: &str, dataset: &str) -> Self {
        Self {
            model_type: String::new(),
            batch_size: 64,
            epochs: 1,
            dataset: dataset.to_string(),
            lr: 0.01,
            function_name: function_name.to_string(),
            options: TrainOptions::default(),
            extra: Extra::new(),
        }
    }

    pub fn with_model_type(mut self, model_type: &str) -> Self {
        self.model_type = model_type.to_string();
        self
    }

    pub fn with_epochs(mut self, epochs: i64) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_options(mut self, options: TrainOptions) -> Self {
        self.options = options;
        self
    }
}

/// Per-epoch metric series reported by the platform.
///
/// The vectors are parallel: index `i` in each describes the same
/// epoch or validation step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainMetrics {
    pub validation_loss: Vec<f64>,
    pub accuracy: Vec<f64>,
    pub train_loss: Vec<f64>,
    pub parallelism: Vec<i64>,
    pub epoch_duration: Vec<f64>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl TrainMetrics {
    /// Number of recorded epochs, taken from the longest series.
    pub fn epochs(&self) -> usize {
        [
            self.validation_loss.len(),
            self.accuracy.len(),
            self.train_loss.len(),
            self.parallelism.len(),
            self.epoch_duration.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn final_accuracy(&self) -> Option<f64> {
        self.accuracy.last().copied()
    }
}

/// The complete record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub id: String,
    pub task: TrainRequest,
    pub data: TrainMetrics,
    #[serde(flatten)]
    pub extra: Extra,
}

impl History {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
