//! Worker-process protocol (§4.8): the primary spawns the same binary
//! re-invoked in `--worker-fd` mode, assigns one batch per worker, and
//! relays newline-delimited `WorkerMessage` JSON back over the child's
//! stdout. Crash handling and the watchdog follow the same shape as the
//! pack's own child-process IPC bridges: a bounded crash counter inside
//! a sliding window, `tokio::process::Command`, and a
//! `tokio::select!`-driven silence timer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::errors::IndexError;
use crate::model::Repository;

pub const WATCHDOG_SILENCE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Everything a worker subprocess needs to reconstruct the pipeline for
/// its assigned batch, since it is spawned with no CLI arguments beyond
/// `--worker-fd` (§4.8: "stdin carries the assigned batch... as one
/// JSON document" — the document carries context, not just paths).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerContext {
    pub language: String,
    pub workspace_root: std::path::PathBuf,
    pub module_name: String,
    pub refer_code_depth: u32,
    pub include_tests: bool,
    pub collect_comments: bool,
    pub exclude_patterns: Vec<String>,
}

/// The JSON document written to a worker's stdin: shared context plus
/// the batch's package paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPayload {
    pub context: WorkerContext,
    pub package_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableError {
    pub message: String,
    pub name: String,
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkerMessage {
    Progress { package: String },
    Result {
        package: String,
        repository_fragment: Option<Repository>,
        error: Option<SerializableError>,
    },
    Done,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: usize,
    pub package_paths: Vec<String>,
}

/// Counts crashes within a sliding time window, the way the pack's
/// agent-bridge-style supervisors bound restart storms rather than
/// retrying forever.
pub struct CrashBudget {
    crashes: VecDeque<Instant>,
    max_crashes: usize,
    window: Duration,
}

impl CrashBudget {
    pub fn new(max_crashes: usize, window: Duration) -> Self {
        CrashBudget { crashes: VecDeque::new(), max_crashes, window }
    }

    pub fn record_crash(&mut self, now: Instant) {
        self.crashes.push_back(now);
        while let Some(&front) = self.crashes.front() {
            if now.duration_since(front) > self.window {
                self.crashes.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.crashes.len() >= self.max_crashes
    }
}

/// Spawns one worker for `batch`, feeds it the batch as one JSON
/// document on stdin, and streams its newline-delimited
/// `WorkerMessage`s back over `result_tx`. Returns `Err(WorkerCrash)`
/// when the child exits before emitting `Done`.
pub async fn run_worker(
    worker_binary: &std::path::Path,
    batch: &Batch,
    context: &WorkerContext,
    result_tx: mpsc::Sender<WorkerMessage>,
) -> Result<(), IndexError> {
    let mut child = Command::new(worker_binary)
        .arg("--worker-fd")
        .arg("0")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::inherit())
        .spawn()
        .map_err(|_| IndexError::WorkerCrash { pid: 0, batch: batch.id })?;

    let pid = child.id().unwrap_or(0);

    if let Some(mut stdin) = child.stdin.take() {
        let worker_payload = WorkerPayload {
            context: context.clone(),
            package_paths: batch.package_paths.clone(),
        };
        let payload = serde_json::to_vec(&worker_payload).unwrap_or_default();
        let _ = stdin.write_all(&payload).await;
        let _ = stdin.write_all(b"\n").await;
        drop(stdin);
    }

    let mut saw_done = false;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkerMessage>(&line) {
                Ok(message) => {
                    if matches!(message, WorkerMessage::Done) {
                        saw_done = true;
                    }
                    let _ = result_tx.send(message).await;
                }
                Err(e) => {
                    tracing::warn!(batch = batch.id, error = %e, "worker emitted unparsable message");
                }
            }
        }
    }

    let status = child.wait().await;
    if !saw_done || status.map(|s| !s.success()).unwrap_or(true) {
        return Err(IndexError::WorkerCrash { pid, batch: batch.id });
    }
    Ok(())
}

/// Splits `packages` into roughly `2 * worker_count` batches.
pub fn partition_into_batches(packages: &[String], worker_count: usize) -> Vec<Batch> {
    let target_batches = (worker_count * 2).max(1);
    let batch_size = (packages.len() + target_batches - 1) / target_batches.max(1);
    let batch_size = batch_size.max(1);
    packages
        .chunks(batch_size)
        .enumerate()
        .map(|(id, chunk)| Batch { id, package_paths: chunk.to_vec() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crash_budget_evicts_old_crashes_outside_window() {
        let mut budget = CrashBudget::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        budget.record_crash(t0);
        assert!(!budget.is_exhausted());
        budget.record_crash(t0 + Duration::from_secs(10));
        assert!(budget.is_exhausted());
    }

    #[test]
    fn partitions_roughly_into_double_worker_count_batches() {
        let packages: Vec<String> = (0..40).map(|i| format!("pkg{i}")).collect();
        let batches = partition_into_batches(&packages, 4);
        assert!(batches.len() <= 8);
        let total: usize = batches.iter().map(|b| b.package_paths.len()).sum();
        assert_eq!(total, 40);
    }
}
