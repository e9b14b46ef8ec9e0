//! Work distributor (§4.8): chooses single-process or multi-worker
//! strategy, partitions packages into batches, spawns workers,
//! re-queues on crash, and aggregates results under either the
//! "combined" or "separate" output mode.

pub mod evaluator;
pub mod worker;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};

use crate::errors::IndexError;
use crate::model::Repository;
use evaluator::{choose_strategy, worker_count, ProjectMetrics, Strategy};
use worker::{partition_into_batches, run_worker, Batch, CrashBudget, WorkerMessage, WATCHDOG_SILENCE_WINDOW};
pub use worker::WorkerContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    Combined,
    Separate,
}

pub struct DistributorOptions {
    pub worker_binary: PathBuf,
    pub output_dir: PathBuf,
    pub aggregation: AggregationMode,
    pub override_worker_count: Option<usize>,
    pub worker_context: WorkerContext,
}

#[derive(Debug)]
pub struct DistributorOutcome {
    pub combined: Option<Repository>,
    pub errors: Vec<IndexError>,
    pub timed_out: bool,
}

/// Runs the full distributor: evaluates project size, picks a
/// strategy, and for `WorkerPool` drives batches through
/// [`worker::run_worker`] with crash re-queueing and a 15-minute
/// watchdog. `single_process_fn` is invoked directly (no subprocess) for
/// the `SingleProcess` strategy.
pub async fn run_distributed(
    metrics: &ProjectMetrics,
    packages: Vec<String>,
    cpu_count: usize,
    options: &DistributorOptions,
    single_process_fn: impl FnOnce(&[String]) -> Result<Repository, IndexError>,
) -> DistributorOutcome {
    match choose_strategy(metrics) {
        Strategy::SingleProcess => match single_process_fn(&packages) {
            Ok(repo) => DistributorOutcome { combined: Some(repo), errors: Vec::new(), timed_out: false },
            Err(e) => DistributorOutcome { combined: None, errors: vec![e], timed_out: false },
        },
        Strategy::WorkerPool => {
            let workers = worker_count(metrics, cpu_count, options.override_worker_count);
            run_worker_pool(packages, workers, options).await
        }
    }
}

/// Crashes are re-queued at the head of the shared batch queue (so a
/// failed batch is the next one any free slot picks up) up to a bounded
/// number of times per §4.8; once the budget is exhausted the batch's
/// packages are dropped with a `WorkerCrash` error rather than retried
/// forever.
async fn run_worker_pool(packages: Vec<String>, workers: usize, options: &DistributorOptions) -> DistributorOutcome {
    let batches = partition_into_batches(&packages, workers);
    let queue = Arc::new(Mutex::new(VecDeque::from(batches)));
    let crash_budget = Arc::new(Mutex::new(CrashBudget::new(3, Duration::from_secs(15 * 60))));
    let (tx, mut rx) = mpsc::channel::<WorkerMessage>(256);
    let errors = Arc::new(Mutex::new(Vec::<IndexError>::new()));

    let mut slot_handles = Vec::new();
    for _ in 0..workers.max(1) {
        let queue = Arc::clone(&queue);
        let crash_budget = Arc::clone(&crash_budget);
        let errors = Arc::clone(&errors);
        let worker_binary = options.worker_binary.clone();
        let worker_context = options.worker_context.clone();
        let tx = tx.clone();
        slot_handles.push(tokio::spawn(async move {
            loop {
                let batch = {
                    let mut q = queue.lock().await;
                    q.pop_front()
                };
                let Some(batch) = batch else { break };
                if let Err(e) = run_worker(&worker_binary, &batch, &worker_context, tx.clone()).await {
                    let mut budget = crash_budget.lock().await;
                    budget.record_crash(Instant::now());
                    if budget.is_exhausted() {
                        errors.lock().await.push(e);
                    } else {
                        tracing::warn!(batch = batch.id, "worker crashed, re-queuing batch at head");
                        queue.lock().await.push_front(batch);
                    }
                }
            }
        }));
    }
    drop(tx);

    let mut per_package_fragments: Vec<(String, Repository)> = Vec::new();
    let mut timed_out = false;
    let mut last_message_at = Instant::now();

    loop {
        tokio::select! {
            maybe_msg = rx.recv() => {
                match maybe_msg {
                    Some(WorkerMessage::Result { package, repository_fragment, error }) => {
                        last_message_at = Instant::now();
                        if let Some(fragment) = repository_fragment {
                            per_package_fragments.push((package, fragment));
                        } else if let Some(err) = error {
                            tracing::warn!(package = %package, error = %err.message, "worker reported a package-level error");
                        }
                    }
                    Some(WorkerMessage::Progress { .. }) => {
                        last_message_at = Instant::now();
                    }
                    Some(WorkerMessage::Done) => {
                        last_message_at = Instant::now();
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(WATCHDOG_SILENCE_WINDOW) => {
                if last_message_at.elapsed() >= WATCHDOG_SILENCE_WINDOW {
                    timed_out = true;
                    break;
                }
            }
        }
    }

    for handle in slot_handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "worker slot task panicked");
        }
    }

    let mut errors = Arc::try_unwrap(errors).map(|m| m.into_inner()).unwrap_or_default();
    if timed_out {
        errors.push(IndexError::WorkerTimeout);
    }

    match options.aggregation {
        AggregationMode::Combined => {
            let mut combined = Repository::new("worker-pool", "");
            for (_, fragment) in per_package_fragments {
                combined.merge(fragment);
            }
            DistributorOutcome { combined: Some(combined), errors, timed_out }
        }
        AggregationMode::Separate => {
            for (package, fragment) in &per_package_fragments {
                let sanitized = sanitize_filename(package);
                let path = options.output_dir.join(format!("{sanitized}.json"));
                if let Ok(json) = serde_json::to_string_pretty(fragment) {
                    let _ = std::fs::write(&path, json);
                }
            }
            DistributorOutcome { combined: None, errors, timed_out }
        }
    }
}

/// Sanitises a module/package name for use as an output filename in
/// separate mode by replacing path- and shell-hostile characters.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if "/\\:*?\"<>|@".contains(c) { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_reserved_filename_characters() {
        assert_eq!(sanitize_filename("@acme/pkg:a"), "_acme_pkg_a");
    }
}
