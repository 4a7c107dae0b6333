//! Fixed pool of download workers draining a shared [`JobQueue`].
//!
//! Workers are started first, then every job is enqueued and the queue is
//! closed. Each worker loops pop → transfer → report until the queue is
//! closed and empty, then exits; the pool is done when all workers have been
//! joined. Failures are reported as they happen and never stop the pool.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::config::{ConfigError, EngineConfig};
use crate::downloader::{self, TransferError, TransferOptions, TransferOutcome};
use crate::job::Job;
use crate::limiter::RateLimiter;

use super::progress::{ProgressBoard, ProgressHandle};
use super::queue::{JobQueue, QueueError};
use super::render::ProgressSink;

/// Requests early shutdown of a pool: jobs not yet picked up are dropped
/// (reported as cancelled) and in-flight transfers run to completion.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    inner: Arc<ShutdownState>,
}

#[derive(Debug, Default)]
struct ShutdownState {
    requested: AtomicBool,
    queue: Mutex<Option<Arc<JobQueue>>>,
    cancelled: Mutex<Vec<Job>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the job queue early. Safe to call at any time, any number of times.
    pub fn shutdown(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        let queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(queue) = queue {
            let drained = queue.cancel();
            if !drained.is_empty() {
                tracing::info!(skipped = drained.len(), "shutdown requested; pending jobs dropped");
            }
            self.inner
                .cancelled
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend(drained);
        }
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    fn attach(&self, queue: Arc<JobQueue>) {
        *self.inner.queue.lock().unwrap_or_else(|e| e.into_inner()) = Some(queue);
        if self.is_requested() {
            self.shutdown();
        }
    }

    fn take_cancelled(&self) -> Vec<Job> {
        std::mem::take(&mut *self.inner.cancelled.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

/// Everything a worker needs besides the queue.
struct WorkerContext {
    board: Arc<ProgressBoard>,
    sink: Arc<dyn ProgressSink>,
    limiter: Option<Arc<RateLimiter>>,
    output_dir: PathBuf,
    options: TransferOptions,
}

impl WorkerContext {
    fn progress_for(&self, job: &Job) -> ProgressHandle {
        self.board.handle(job.index).unwrap_or_else(|| {
            tracing::warn!(job = job.index, "no progress row for job; progress not shown");
            ProgressBoard::new().new_entry(job.display_name(), job.size_hint)
        })
    }
}

/// N persistent workers sharing one queue, one rate limiter and one progress board.
pub struct WorkerPool {
    worker_count: usize,
    ctx: Arc<WorkerContext>,
    shutdown: ShutdownHandle,
}

impl WorkerPool {
    /// Builds a pool from a validated config. The bandwidth cap (if any) becomes
    /// one limiter shared by every worker.
    pub fn new(
        config: &EngineConfig,
        board: Arc<ProgressBoard>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let limiter = RateLimiter::for_cap(config.bandwidth_cap_bytes_per_sec).map(Arc::new);
        Ok(Self {
            worker_count: config.worker_count,
            ctx: Arc::new(WorkerContext {
                board,
                sink,
                limiter,
                output_dir: config.output_dir.clone(),
                options: TransferOptions::from(config),
            }),
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Uses `handle` for early shutdown instead of the pool's own.
    pub fn with_shutdown(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = handle;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Runs every job to completion and returns exactly one outcome per job,
    /// sorted by job index. Blocks the calling thread until all workers exit.
    pub fn run(&self, jobs: Vec<Job>) -> Result<Vec<TransferOutcome>> {
        let total = jobs.len();
        let queue = Arc::new(JobQueue::with_capacity(total));
        let (tx, rx) = mpsc::channel::<TransferOutcome>();

        let mut handles = Vec::with_capacity(self.worker_count);
        for id in 1..=self.worker_count {
            let worker_queue = Arc::clone(&queue);
            let ctx = Arc::clone(&self.ctx);
            let tx = tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("mdl-worker-{}", id))
                .spawn(move || worker_loop(id, &worker_queue, &ctx, &tx));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    queue.cancel();
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(e).context("spawn download worker");
                }
            }
        }
        drop(tx);
        tracing::debug!(workers = self.worker_count, jobs = total, "worker pool started");

        // Attach first: a shutdown requested earlier closes the queue before
        // any job is pushed, and pushes after a shutdown are refused.
        self.shutdown.attach(Arc::clone(&queue));
        let mut skipped = Vec::new();
        for job in &jobs {
            match queue.push(job.clone()) {
                Ok(()) => {}
                Err(QueueError::Closed) => skipped.push(job.clone()),
                Err(e) => tracing::error!(job = job.index, "enqueue failed: {}", e),
            }
        }
        queue.close();

        // Every worker holds a sender; the channel ends when the last one exits.
        let mut outcomes: Vec<TransferOutcome> = rx.iter().collect();

        for h in handles {
            if h.join().is_err() {
                tracing::error!("download worker panicked");
            }
        }

        for job in self.shutdown.take_cancelled().into_iter().chain(skipped) {
            outcomes.push(cancelled_outcome(&self.ctx, job));
        }

        // Jobs a panicking worker took down with it.
        let seen: HashSet<usize> = outcomes.iter().map(|o| o.job.index).collect();
        for job in jobs.into_iter().filter(|j| !seen.contains(&j.index)) {
            let err = TransferError::WorkerPanicked;
            self.ctx.progress_for(&job).mark_failed(err.to_string());
            self.ctx.sink.job_failed(&job.display_name(), &err);
            outcomes.push(TransferOutcome::not_run(job, err));
        }

        outcomes.sort_by_key(|o| o.job.index);
        tracing::debug!(outcomes = outcomes.len(), "worker pool drained");
        Ok(outcomes)
    }
}

fn cancelled_outcome(ctx: &WorkerContext, job: Job) -> TransferOutcome {
    ctx.progress_for(&job).mark_failed(TransferError::Cancelled.to_string());
    TransferOutcome::not_run(job, TransferError::Cancelled)
}

fn worker_loop(
    id: usize,
    queue: &JobQueue,
    ctx: &WorkerContext,
    tx: &mpsc::Sender<TransferOutcome>,
) {
    while let Some(job) = queue.pop() {
        let label = job.display_name();
        let progress = ctx.progress_for(&job);
        tracing::debug!(worker = id, job = job.index, "processing {}", label);
        let outcome = downloader::transfer(
            job,
            &progress,
            ctx.limiter.as_ref(),
            &ctx.output_dir,
            &ctx.options,
        );
        if let Some(err) = &outcome.error {
            tracing::warn!(worker = id, job = outcome.job.index, "{}: {}", label, err);
            ctx.sink.job_failed(&label, err);
        }
        if tx.send(outcome).is_err() {
            break;
        }
    }
    tracing::debug!(worker = id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, UNKNOWN_SIZE};
    use crate::scheduler::render::NullSink;
    use crate::scheduler::EntryState;

    fn unreachable_jobs(n: usize, board: &ProgressBoard) -> Vec<Job> {
        (0..n)
            .map(|i| {
                let job = Job::from_spec(
                    JobSpec::parse(&format!("http://127.0.0.1:9/{i}.bin")),
                    i,
                    UNKNOWN_SIZE,
                );
                board.new_entry(job.display_name(), job.size_hint);
                job
            })
            .collect()
    }

    fn config(workers: usize, dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            worker_count: workers,
            output_dir: dir.to_path_buf(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn zero_workers_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let board = Arc::new(ProgressBoard::new());
        let res = WorkerPool::new(&config(0, dir.path()), board, Arc::new(NullSink));
        assert!(matches!(res, Err(ConfigError::InvalidWorkerCount(0))));
    }

    #[test]
    fn every_job_yields_exactly_one_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let board = Arc::new(ProgressBoard::new());
        let jobs = unreachable_jobs(7, &board);
        let pool = WorkerPool::new(&config(3, dir.path()), Arc::clone(&board), Arc::new(NullSink)).unwrap();
        let outcomes = pool.run(jobs).unwrap();
        assert_eq!(outcomes.len(), 7);
        let indices: Vec<usize> = outcomes.iter().map(|o| o.job.index).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
        assert!(outcomes.iter().all(|o| o.error.is_some()));
        assert!(board.snapshot().iter().all(|s| s.state == EntryState::Failed));
    }

    #[test]
    fn empty_job_list_drains_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let board = Arc::new(ProgressBoard::new());
        let pool = WorkerPool::new(&config(2, dir.path()), board, Arc::new(NullSink)).unwrap();
        assert!(pool.run(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn shutdown_before_run_cancels_everything() {
        let dir = tempfile::tempdir().unwrap();
        let board = Arc::new(ProgressBoard::new());
        let jobs = unreachable_jobs(4, &board);
        let pool = WorkerPool::new(&config(1, dir.path()), Arc::clone(&board), Arc::new(NullSink)).unwrap();
        let handle = pool.shutdown_handle();
        handle.shutdown();
        let outcomes = pool.run(jobs).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes
            .iter()
            .all(|o| o.error.as_ref().is_some_and(TransferError::is_cancelled)));
        assert!(board
            .snapshot()
            .iter()
            .all(|s| s.failure.as_deref() == Some("cancelled before start")));
    }
}
