// WellSleuth - app/batch.rs
//
// Concurrency-limited batch runs over many input files.
//
// Architecture:
//   - A rayon pool sized to the requested concurrency runs one pipeline per
//     file. Runs share nothing but the read-only `Arc<ProcessingOptions>`.
//   - Outcomes are sent over an mpsc channel as each run completes, so the
//     returned list is in completion order.
//   - With a timeout, each run executes on its own thread and the pool
//     worker waits with `recv_timeout`. A run that overruns is abandoned
//     and reported as failed; its eventual result is discarded.

use crate::core::pipeline::{self, PipelineResult, ProcessingOptions};
use crate::platform::fs;
use crate::util::constants;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

/// Batch-level settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchConfig {
    /// Concurrent runs (0 = one per available core).
    pub jobs: usize,
    /// Per-file wall-clock limit.
    pub timeout: Option<Duration>,
}

/// How a single file's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The pipeline ran; inspect `result.success` for its verdict.
    Completed,
    /// The input could not be read (missing, too large, I/O failure).
    ReadFailed,
    /// The run exceeded the per-file timeout.
    TimedOut,
    /// The worker thread could not start or died without a result.
    Aborted,
}

/// The outcome of one file in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: PathBuf,
    pub filename: String,
    pub status: OutcomeStatus,
    /// Present only for completed runs.
    pub result: Option<PipelineResult>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl BatchOutcome {
    /// True when the pipeline completed and reported success.
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Completed
            && self.result.as_ref().is_some_and(|r| r.success)
    }

    fn failed(path: &Path, status: OutcomeStatus, error: String, started: Instant) -> Self {
        Self {
            path: path.to_path_buf(),
            filename: display_name(path),
            status,
            result: None,
            error: Some(error),
            elapsed: started.elapsed(),
        }
    }
}

/// Process every file, at most `config.jobs` at a time.
///
/// Returns one outcome per input, in completion order.
pub fn run_batch(
    files: &[PathBuf],
    options: Arc<ProcessingOptions>,
    config: BatchConfig,
) -> Vec<BatchOutcome> {
    let jobs = config.jobs.min(constants::ABSOLUTE_MAX_CONCURRENCY);
    let batch_start = Instant::now();
    tracing::info!(
        files = files.len(),
        jobs,
        timeout_secs = config.timeout.map(|t| t.as_secs()),
        "Batch started"
    );

    let (tx, rx) = mpsc::channel::<BatchOutcome>();

    match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("wellsleuth-batch-{i}"))
        .build()
    {
        Ok(pool) => pool.scope(|scope| {
            for path in files {
                let tx = tx.clone();
                let options = Arc::clone(&options);
                scope.spawn(move |_| {
                    let _ = tx.send(process_one(path, options, config.timeout));
                });
            }
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Could not build batch thread pool; running sequentially");
            for path in files {
                let _ = tx.send(process_one(path, Arc::clone(&options), config.timeout));
            }
        }
    }
    drop(tx);

    let outcomes: Vec<BatchOutcome> = rx.into_iter().collect();
    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    tracing::info!(
        files = outcomes.len(),
        succeeded,
        failed = outcomes.len() - succeeded,
        duration_ms = batch_start.elapsed().as_millis() as u64,
        "Batch finished"
    );
    outcomes
}

fn process_one(path: &Path, options: Arc<ProcessingOptions>, timeout: Option<Duration>) -> BatchOutcome {
    let started = Instant::now();
    match timeout {
        None => run_one(path, &options, started),
        Some(limit) => {
            let owned_path = path.to_path_buf();
            run_with_timeout(path, limit, started, move || run_one(&owned_path, &options, started))
        }
    }
}

/// Run `work` on its own thread and wait at most `limit` for its outcome.
/// An overrunning thread is left to finish; its outcome is discarded.
fn run_with_timeout<F>(path: &Path, limit: Duration, started: Instant, work: F) -> BatchOutcome
where
    F: FnOnce() -> BatchOutcome + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name(format!("wellsleuth-run-{}", display_name(path)))
        .spawn(move || {
            let _ = tx.send(work());
        });
    if let Err(e) = spawned {
        return BatchOutcome::failed(
            path,
            OutcomeStatus::Aborted,
            format!("could not start worker thread: {e}"),
            started,
        );
    }

    match rx.recv_timeout(limit) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(
                file = %path.display(),
                timeout_secs = limit.as_secs_f64(),
                "File run timed out"
            );
            BatchOutcome::failed(
                path,
                OutcomeStatus::TimedOut,
                format!("timed out after {:.1}s", limit.as_secs_f64()),
                started,
            )
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => BatchOutcome::failed(
            path,
            OutcomeStatus::Aborted,
            "worker thread ended without a result".to_string(),
            started,
        ),
    }
}

fn run_one(path: &Path, options: &ProcessingOptions, started: Instant) -> BatchOutcome {
    let filename = display_name(path);
    let bytes = match fs::read_bounded(path, options.parse.max_input_bytes) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "Could not read input");
            return BatchOutcome::failed(path, OutcomeStatus::ReadFailed, e.to_string(), started);
        }
    };

    let result = pipeline::run(bytes.as_ref(), &filename, options);
    tracing::debug!(
        file = %filename,
        success = result.success,
        conditioned = result.conditioned,
        "File run completed"
    );
    BatchOutcome {
        path: path.to_path_buf(),
        filename,
        status: OutcomeStatus::Completed,
        error: result.errors.first().cloned(),
        result: Some(result),
        elapsed: started.elapsed(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
