//! Batch runner: probe → board → render tick → worker pool → final flush.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::downloader::{OutcomeSummary, TransferOutcome};
use crate::fetch_head;
use crate::job::JobSpec;
use crate::resolver;

use super::pool::{ShutdownHandle, WorkerPool};
use super::progress::{ProgressBoard, ProgressSnapshot};
use super::render::{ProgressSink, RenderLoop};

/// What happened to every job of one batch.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs dropped by an early shutdown (also counted in `failed`).
    pub cancelled: usize,
    pub bytes_total: u64,
    pub elapsed_secs: f64,
    /// One entry per job, sorted by job index.
    pub jobs: Vec<OutcomeSummary>,
    #[serde(skip)]
    pub outcomes: Vec<TransferOutcome>,
    /// Progress rows as of the final render.
    #[serde(skip)]
    pub final_rows: Vec<ProgressSnapshot>,
}

impl BatchReport {
    fn build(
        output_dir: PathBuf,
        outcomes: Vec<TransferOutcome>,
        final_rows: Vec<ProgressSnapshot>,
        started: Instant,
    ) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let cancelled = outcomes
            .iter()
            .filter(|o| o.error.as_ref().is_some_and(|e| e.is_cancelled()))
            .count();
        Self {
            output_dir,
            succeeded,
            failed: outcomes.len() - succeeded,
            cancelled,
            bytes_total: outcomes.iter().map(|o| o.bytes_written).sum(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            jobs: outcomes.iter().map(TransferOutcome::summary).collect(),
            outcomes,
            final_rows,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// One batch of downloads, with a shutdown handle available before it starts.
pub struct Batch {
    specs: Vec<JobSpec>,
    config: EngineConfig,
    shutdown: ShutdownHandle,
}

impl Batch {
    pub fn new(specs: Vec<JobSpec>, config: EngineConfig) -> Self {
        Self {
            specs,
            config,
            shutdown: ShutdownHandle::new(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Runs the batch to completion. Job failures end up in the report;
    /// only setup problems (bad config, unusable output directory) are errors.
    pub async fn run(self, sink: Arc<dyn ProgressSink>) -> Result<BatchReport> {
        let Batch {
            specs,
            mut config,
            shutdown,
        } = self;
        config.validate()?;
        let started = Instant::now();

        std::fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("create output dir {}", config.output_dir.display()))?;
        config.output_dir = resolver::absolute_dir(&config.output_dir)
            .with_context(|| format!("resolve output dir {}", config.output_dir.display()))?;

        tracing::info!(
            jobs = specs.len(),
            workers = config.worker_count,
            cap = config.bandwidth_cap_bytes_per_sec,
            dir = %config.output_dir.display(),
            "batch started"
        );

        let jobs = tokio::task::spawn_blocking({
            let timeout = config.probe_timeout;
            let user_agent = config.user_agent.clone();
            let shutdown = shutdown.clone();
            move || {
                fetch_head::probe_all_until(specs, timeout, &user_agent, || shutdown.is_requested())
            }
        })
        .await
        .context("probe task join")?;

        let board = Arc::new(ProgressBoard::new());
        for job in &jobs {
            board.new_entry(job.display_name(), job.size_hint);
        }

        let pool = WorkerPool::new(&config, Arc::clone(&board), Arc::clone(&sink))?
            .with_shutdown(shutdown);
        let render = RenderLoop::spawn(Arc::clone(&board), sink, config.render_interval);

        let pooled = tokio::task::spawn_blocking(move || pool.run(jobs)).await;
        let final_rows = render.finish().await;
        let outcomes = pooled.context("worker pool join")??;

        let report = BatchReport::build(config.output_dir, outcomes, final_rows, started);
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            bytes = report.bytes_total,
            "batch finished in {:.1}s",
            report.elapsed_secs
        );
        Ok(report)
    }
}

/// Probes, downloads and reports `specs` with the given engine settings.
pub async fn run_batch(
    specs: Vec<JobSpec>,
    config: EngineConfig,
    sink: Arc<dyn ProgressSink>,
) -> Result<BatchReport> {
    Batch::new(specs, config).run(sink).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::render::NullSink;
    use crate::scheduler::EntryState;
    use std::time::Duration;

    fn config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            worker_count: 2,
            output_dir: dir.to_path_buf(),
            probe_timeout: Duration::from_secs(2),
            render_interval: Duration::from_millis(20),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn unreachable_jobs_fail_but_batch_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let specs = vec![
            JobSpec::parse("http://127.0.0.1:9/a.bin"),
            JobSpec::parse("http://127.0.0.1:9/b.bin@b2.bin"),
        ];
        let report = run_batch(specs, config(dir.path()), Arc::new(NullSink))
            .await
            .unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.cancelled, 0);
        assert_eq!(report.jobs[1].name, "b2.bin");
        assert!(report
            .final_rows
            .iter()
            .all(|r| r.state == EntryState::Failed));
    }

    #[tokio::test]
    async fn output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("x/y");
        let report = run_batch(Vec::new(), config(&nested), Arc::new(NullSink))
            .await
            .unwrap();
        assert!(nested.is_dir());
        assert_eq!(report.total(), 0);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn invalid_worker_count_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig {
            worker_count: 0,
            ..config(dir.path())
        };
        assert!(run_batch(Vec::new(), cfg, Arc::new(NullSink)).await.is_err());
    }

    #[tokio::test]
    async fn shutdown_before_run_reports_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let batch = Batch::new(
            vec![JobSpec::parse("http://127.0.0.1:9/a.bin")],
            config(dir.path()),
        );
        batch.shutdown_handle().shutdown();
        let report = batch.run(Arc::new(NullSink)).await.unwrap();
        assert_eq!(report.cancelled, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["jobs"][0]["error"], "cancelled before start");
        assert!(json.get("outcomes").is_none());
    }

    #[tokio::test]
    async fn shutdown_skips_size_probes() {
        let dir = tempfile::tempdir().unwrap();
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/", silent.local_addr().unwrap());
        let specs = (0..3)
            .map(|i| JobSpec::parse(&format!("{base}{i}.bin")))
            .collect();
        let cfg = EngineConfig {
            probe_timeout: Duration::from_secs(5),
            ..config(dir.path())
        };
        let batch = Batch::new(specs, cfg);
        batch.shutdown_handle().shutdown();

        let started = Instant::now();
        let report = batch.run(Arc::new(NullSink)).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.cancelled, 3);
    }
}
