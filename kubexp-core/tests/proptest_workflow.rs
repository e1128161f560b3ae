//! Property-based tests for history parsing, run ids and completion polling.

use async_trait::async_trait;
use kubexp_core::command::render_command;
use kubexp_core::{
    CommandOutput, CommandRunner, History, KubemlClient, Poller, Result, TaskLister, TrainMetrics,
    TrainOptions, TrainRequest,
};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- History JSON round-trip ---

fn finite() -> impl Strategy<Value = f64> {
    -1.0e6f64..1.0e6
}

fn options() -> impl Strategy<Value = TrainOptions> {
    (1i64..64, any::<bool>(), 1i64..10, 1i64..128, 0.0f64..100.0).prop_map(
        |(default_parallelism, static_parallelism, validate_every, k, goal_accuracy)| {
            TrainOptions {
                default_parallelism,
                static_parallelism,
                validate_every,
                k,
                goal_accuracy,
                extra: Default::default(),
            }
        },
    )
}

fn metrics() -> impl Strategy<Value = TrainMetrics> {
    (0usize..20).prop_flat_map(|n| {
        (
            prop::collection::vec(finite(), n),
            prop::collection::vec(0.0f64..100.0, n),
            prop::collection::vec(finite(), n),
            prop::collection::vec(1i64..64, n),
            prop::collection::vec(0.0f64..3600.0, n),
        )
            .prop_map(
                |(validation_loss, accuracy, train_loss, parallelism, epoch_duration)| {
                    TrainMetrics {
                        validation_loss,
                        accuracy,
                        train_loss,
                        parallelism,
                        epoch_duration,
                        extra: Default::default(),
                    }
                },
            )
    })
}

fn history() -> impl Strategy<Value = History> {
    (
        "[a-z0-9-]{1,16}",
        "[a-z]{1,10}",
        "[a-z]{1,10}",
        1i64..512,
        1i64..100,
        0.0001f64..1.0,
        options(),
        metrics(),
    )
        .prop_map(|(id, function, dataset, batch, epochs, lr, options, data)| {
            let task = TrainRequest::new(&function, &dataset)
                .with_model_type(&function)
                .with_batch_size(batch)
                .with_epochs(epochs)
                .with_lr(lr)
                .with_options(options);
            History {
                id,
                task,
                data,
                extra: Default::default(),
            }
        })
}

fn unknown_fields() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec(
        (
            "x_[a-z]{1,8}",
            prop_oneof![
                any::<bool>().prop_map(Value::from),
                any::<i32>().prop_map(Value::from),
                "[a-z ]{0,12}".prop_map(Value::from),
                Just(json!({"nested": [1, 2, 3]})),
            ],
        ),
        0..4,
    )
}

proptest! {
    #[test]
    fn history_roundtrip(h in history()) {
        let json = h.to_json().unwrap();
        let parsed = History::from_json(&json).unwrap();
        prop_assert_eq!(parsed, h);
    }

    #[test]
    fn unknown_fields_survive_roundtrip(h in history(), top in unknown_fields(), nested in unknown_fields()) {
        let mut doc = serde_json::to_value(&h).unwrap();
        for (key, value) in &top {
            doc[key.as_str()] = value.clone();
        }
        for (key, value) in &nested {
            doc["data"][key.as_str()] = value.clone();
        }

        let parsed: History = serde_json::from_value(doc.clone()).unwrap();
        let reparsed = History::from_json(&parsed.to_json().unwrap()).unwrap();
        prop_assert_eq!(&reparsed, &parsed);
        prop_assert_eq!(serde_json::to_value(&reparsed).unwrap(), doc);
    }
}

// --- Run id from start-training ---

/// Answers every invocation with the same stdout.
struct FixedStdout(String);

#[async_trait]
impl CommandRunner for FixedStdout {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        Ok(CommandOutput {
            command: render_command(program, args),
            stdout: self.0.clone(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

proptest! {
    #[test]
    fn run_id_is_trimmed_stdout(
        h in history(),
        id in "[a-z0-9-]{0,16}",
        pad in "[ \t\r\n]{0,3}",
    ) {
        let stdout = format!("{id}{pad}\n");
        let client = KubemlClient::with_runner("kubeml", Arc::new(FixedStdout(stdout.clone())));
        let run_id = tokio_test::block_on(client.start_training(&h.task)).unwrap();

        prop_assert_eq!(run_id.as_str(), stdout.trim_end());
        prop_assert_eq!(run_id, id);
    }
}

// --- Polling termination ---

struct Listings(Mutex<VecDeque<Vec<String>>>);

#[async_trait]
impl TaskLister for Listings {
    async fn running_tasks(&self) -> Result<Vec<String>> {
        Ok(self.0.lock().unwrap().pop_front().unwrap_or_default())
    }
}

proptest! {
    #[test]
    fn polling_stops_at_first_absence(
        running_for in 0usize..8,
        others in prop::collection::vec("[a-z]{1,4}", 0..4),
    ) {
        let target = "run-target".to_string();
        let mut listings: VecDeque<Vec<String>> = VecDeque::new();
        for _ in 0..running_for {
            let mut listing = others.clone();
            listing.push(target.clone());
            listings.push_back(listing);
        }
        listings.push_back(others.clone());
        // Reappearing later must not matter: polling has already stopped.
        listings.push_back(vec![target.clone()]);

        let lister = Listings(Mutex::new(listings));
        let outcome = tokio_test::block_on(
            Poller::new(Duration::ZERO).wait_until_finished(&lister, &target),
        )
        .unwrap();

        prop_assert_eq!(outcome.attempts as usize, running_for + 1);
        prop_assert_eq!(outcome.seen_running, running_for > 0);
        prop_assert_eq!(lister.0.lock().unwrap().len(), 1);
    }
}
