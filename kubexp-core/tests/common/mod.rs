//! Scripted stand-in for the `kubeml` binary.

#![allow(dead_code)]

use async_trait::async_trait;
use kubexp_core::command::render_command;
use kubexp_core::{CommandOutput, CommandRunner, Result};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Reply to a single invocation.
#[derive(Debug, Clone)]
pub struct Reply {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn err(stdout: &str, stderr: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: 1,
        }
    }

    pub fn listing(ids: &[&str]) -> Self {
        let mut out = ids.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Self::ok(&out)
    }
}

/// Answers `train`, `task` and `history` sub-commands from separate queues.
#[derive(Default)]
pub struct ScriptedKubeml {
    train: Mutex<VecDeque<Reply>>,
    task: Mutex<VecDeque<Reply>>,
    history: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedKubeml {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_train(self, reply: Reply) -> Self {
        self.train.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_task_list(self, reply: Reply) -> Self {
        self.task.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_history(self, reply: Reply) -> Self {
        self.history.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedKubeml {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let command = render_command(program, args);
        self.calls.lock().unwrap().push(command.clone());

        let queue = match args.first().map(String::as_str) {
            Some("train") => &self.train,
            Some("task") => &self.task,
            Some("history") => &self.history,
            other => panic!("unexpected kubeml sub-command {other:?}"),
        };
        let reply = queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply left for `{command}`"));

        Ok(CommandOutput {
            command,
            stdout: reply.stdout,
            stderr: reply.stderr,
            exit_code: Some(reply.exit_code),
        })
    }
}

pub fn history_json(id: &str) -> String {
    serde_json::json!({
        "id": id,
        "task": {
            "model_type": "cnn",
            "batch_size": 32,
            "epochs": 5,
            "dataset": "mnist",
            "lr": 0.01,
            "function_name": "cnn",
            "options": {
                "default_parallelism": 5,
                "static_parallelism": false,
                "validate_every": 1,
                "K": 10,
                "goal_accuracy": 100.0
            }
        },
        "data": {
            "validation_loss": [0.61, 0.32, 0.21, 0.17, 0.15],
            "accuracy": [81.5, 90.25, 94.0, 95.5, 96.125],
            "train_loss": [0.9, 0.45, 0.3, 0.22, 0.19],
            "parallelism": [5, 5, 4, 4, 4],
            "epoch_duration": [31.2, 29.8, 27.4, 27.1, 26.9]
        },
        "finished_at": "2021-04-12T18:22:03Z"
    })
    .to_string()
}
