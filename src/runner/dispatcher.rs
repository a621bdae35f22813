use super::classifier::Classifier;
use super::task::{TaskOutcome, TaskResult, TaskUnit};
use crate::client::AuthApi;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};

/// Runs batches of tasks with bounded parallelism.
///
/// Each task runs on its own tokio task, gated by a semaphore holding
/// `max_workers` permits. Workers hand their result to a single collector
/// over an mpsc channel, so results come back in completion order and no two
/// workers share a slot.
pub struct Dispatcher {
    client: Arc<dyn AuthApi>,
    classifier: Arc<Classifier>,
    max_workers: usize,
    task_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn AuthApi>, classifier: Arc<Classifier>, max_workers: usize) -> Self {
        Self {
            client,
            classifier,
            max_workers: max_workers.max(1),
            task_timeout: None,
        }
    }

    /// Give up on a task after `timeout`, recording an exception
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Execute every task and return one result per task, in completion order
    pub async fn dispatch(&self, tasks: Vec<TaskUnit>) -> Vec<TaskResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let total = tasks.len();
        let workers = self.max_workers.min(total);
        let permits = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::unbounded_channel();

        log::debug!("dispatching {} tasks on {} workers", total, workers);

        for task in tasks {
            let enqueued_at = Instant::now();
            let permits = permits.clone();
            let client = self.client.clone();
            let classifier = self.classifier.clone();
            let timeout = self.task_timeout;
            let tx = tx.clone();

            tokio::spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is dropped
                let _permit = permits.acquire_owned().await.ok();

                let run = AssertUnwindSafe(run_task(&*client, &classifier, &task, timeout))
                    .catch_unwind()
                    .await;
                let outcome = run.unwrap_or_else(|panic| {
                    TaskOutcome::Exception(format!("task panicked: {}", panic_message(&*panic)))
                });

                let result = TaskResult {
                    task_id: task.id,
                    operation: task.kind.operation(),
                    name: task.name,
                    input: task.input,
                    outcome,
                    duration: enqueued_at.elapsed(),
                };
                // Collector outlives every sender
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            if let Some(reason) = result.outcome.reason() {
                log::debug!(
                    "task {} ({}) failed: {}",
                    result.task_id,
                    result.input.label(),
                    reason
                );
            }
            results.push(result);
        }
        results
    }
}

async fn run_task(
    client: &dyn AuthApi,
    classifier: &Classifier,
    task: &TaskUnit,
    timeout: Option<Duration>,
) -> TaskOutcome {
    let request = client.execute(task.kind, &task.input);
    let response = match timeout {
        Some(limit) => match tokio::time::timeout(limit, request).await {
            Ok(response) => response,
            Err(_) => {
                return TaskOutcome::Exception(format!("timed out after {}ms", limit.as_millis()))
            }
        },
        None => request.await,
    };

    match response {
        Ok(response) => classifier.classify(&response, task.expectation, &task.input),
        Err(e) => TaskOutcome::Exception(e.to_string()),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
