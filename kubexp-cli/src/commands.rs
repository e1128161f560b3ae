//! Subcommand definitions and handlers.

use anyhow::Context;
use kubexp_core::config::{init_workspace_config, to_toml};
use kubexp_core::{
    FailurePolicy, KubemlClient, KubexpConfig, MissingRunPolicy, Platform, ReportFormat,
    TrainOptions, TrainRequest, build_experiment, write_history,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Submit a training run, wait for it to finish and print its history
    Run(RunArgs),
    /// List the ids of running training tasks
    Tasks,
    /// Print the history of a network
    History {
        /// Network id
        id: String,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create default workspace configuration file
    Init,
    /// Show effective configuration
    Show,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunArgs {
    /// Experiment title
    #[arg(short, long)]
    pub title: String,

    /// Target platform: kubeml or tensorflow
    #[arg(long, default_value = "kubeml")]
    pub platform: Platform,

    /// Name of the deployed training function
    #[arg(short, long)]
    pub function: String,

    /// Dataset name
    #[arg(short, long)]
    pub dataset: String,

    /// Model type recorded with the request (defaults to the function name)
    #[arg(long)]
    pub model_type: Option<String>,

    #[arg(short, long, default_value_t = 1)]
    pub epochs: i64,

    /// Batch size
    #[arg(short, long, default_value_t = 64)]
    pub batch: i64,

    /// Learning rate
    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    #[arg(long, default_value_t = 5)]
    pub default_parallelism: i64,

    #[arg(long)]
    pub static_parallelism: bool,

    /// Validate every N epochs
    #[arg(long, default_value_t = 1)]
    pub validate_every: i64,

    /// Local steps between model synchronizations
    #[arg(short = 'k', long, default_value_t = 10)]
    pub k: i64,

    #[arg(long, default_value_t = 100.0)]
    pub goal_accuracy: f64,

    /// Milliseconds between task listings
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Give up after this many task listings
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Give up after this many seconds of polling
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Fail if the run never shows up in the running task list
    #[arg(long)]
    pub require_seen: bool,

    /// Only treat a non-zero exit status as a command failure
    #[arg(long)]
    pub allow_stderr: bool,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}

impl RunArgs {
    fn request(&self) -> TrainRequest {
        let model_type = self.model_type.as_deref().unwrap_or(&self.function);
        TrainRequest::new(&self.function, &self.dataset)
            .with_model_type(model_type)
            .with_epochs(self.epochs)
            .with_batch_size(self.batch)
            .with_lr(self.lr)
            .with_options(TrainOptions {
                default_parallelism: self.default_parallelism,
                static_parallelism: self.static_parallelism,
                validate_every: self.validate_every,
                k: self.k,
                goal_accuracy: self.goal_accuracy,
                extra: Default::default(),
            })
    }

    fn apply(&self, config: &mut KubexpConfig) {
        if let Some(ms) = self.poll_interval_ms {
            config.polling.interval_ms = ms;
        }
        if self.max_attempts.is_some() {
            config.polling.max_attempts = self.max_attempts;
        }
        if self.timeout_secs.is_some() {
            config.polling.timeout_secs = self.timeout_secs;
        }
        if self.require_seen {
            config.polling.missing_run = MissingRunPolicy::RequireSeen;
        }
        if self.allow_stderr {
            config.platform.failure_policy = FailurePolicy::NonZeroExit;
        }
    }
}

fn format(pretty: bool) -> ReportFormat {
    if pretty {
        ReportFormat::Pretty
    } else {
        ReportFormat::Compact
    }
}

/// Cancel `token` on the first Ctrl-C and exit on the second.
fn watch_interrupts(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupted, stopping (Ctrl-C again to exit now)");
        token.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

/// Drive `work` until it finishes or `cancel` fires.
///
/// Dropping `work` kills any `kubeml` child it is waiting on.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    tokio::select! {
        result = work => result,
        _ = cancel.cancelled() => Err(anyhow::anyhow!("interrupted")),
    }
}

fn client(config: &KubexpConfig) -> KubemlClient {
    KubemlClient::new(config.platform.binary.clone()).with_policy(config.platform.failure_policy)
}

pub(crate) async fn handle_command(
    command: Commands,
    mut config: KubexpConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => {
            args.apply(&mut config);

            let cancel = CancellationToken::new();
            watch_interrupts(cancel.clone());

            let mut experiment = build_experiment(
                args.platform,
                &args.title,
                args.request(),
                &config,
                format(args.pretty),
                cancel.clone(),
            );
            let mut stdout = std::io::stdout();
            until_cancelled(&cancel, async {
                experiment.run(&mut stdout).await.map_err(anyhow::Error::from)
            })
            .await?;
            Ok(())
        }
        Commands::Tasks => {
            let cancel = CancellationToken::new();
            watch_interrupts(cancel.clone());

            let client = client(&config);
            let running = until_cancelled(&cancel, async {
                client.list_running().await.map_err(anyhow::Error::from)
            })
            .await?;
            for id in running {
                println!("{id}");
            }
            Ok(())
        }
        Commands::History { id, pretty } => {
            let cancel = CancellationToken::new();
            watch_interrupts(cancel.clone());

            let client = client(&config);
            let history = until_cancelled(&cancel, async {
                client.get_history(&id).await.map_err(anyhow::Error::from)
            })
            .await?;
            write_history(&mut std::io::stdout(), &history, format(pretty))?;
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Init => {
                let path = init_workspace_config(workspace)
                    .context("failed to create configuration file")?;
                println!("Created {}", path.display());
                Ok(())
            }
            ConfigAction::Show => {
                print!("{}", to_toml(&config)?);
                Ok(())
            }
        },
    }
}
