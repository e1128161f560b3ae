//! # kubexp-core — training experiments on KubeML
//!
//! Drives a training run through the `kubeml` command-line tool: submit the
//! request, poll the running task list until the run disappears, fetch its
//! JSON history and report it.
//!
//! ```no_run
//! use kubexp_core::{Experiment, KubemlClient, KubemlExperiment, TrainRequest};
//!
//! # async fn demo() -> kubexp_core::Result<()> {
//! let request = TrainRequest::new("cnn", "mnist").with_epochs(5).with_batch_size(32);
//! let mut experiment = KubemlExperiment::new("baseline", request, KubemlClient::default());
//! let history = experiment.run(&mut std::io::stdout()).await?;
//! println!("final accuracy: {:?}", history.data.final_accuracy());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod experiment;
pub mod kubeml;
pub mod poll;
pub mod report;
pub mod types;

pub use command::{CommandOutput, CommandRunner, FailurePolicy, SystemCommandRunner};
pub use config::{KubexpConfig, PlatformConfig, PollingConfig, load_config};
pub use error::{ExperimentError, Result};
pub use experiment::{Experiment, KubemlExperiment, Platform, RunState, TensorflowExperiment};
pub use kubeml::KubemlClient;
pub use poll::{MissingRunPolicy, PollOutcome, Poller, TaskLister};
pub use report::{ReportFormat, write_history};
pub use types::{History, TrainMetrics, TrainOptions, TrainRequest};

use tokio_util::sync::CancellationToken;

/// Build an experiment for `platform` from loaded configuration.
pub fn build_experiment(
    platform: Platform,
    title: &str,
    request: TrainRequest,
    config: &KubexpConfig,
    format: ReportFormat,
    cancel: CancellationToken,
) -> Box<dyn Experiment> {
    match platform {
        Platform::Kubeml => {
            let client = KubemlClient::new(config.platform.binary.clone())
                .with_policy(config.platform.failure_policy);
            Box::new(
                KubemlExperiment::new(title, request, client)
                    .with_poller(Poller::from_config(&config.polling).with_cancellation(cancel))
                    .with_format(format),
            )
        }
        Platform::Tensorflow => Box::new(TensorflowExperiment::new(title)),
    }
}
