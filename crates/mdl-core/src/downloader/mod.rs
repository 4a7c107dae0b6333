//! Transfer unit: one HTTP GET streamed to a collision-free file.
//!
//! Every failure is local to its job and comes back inside the
//! [`TransferOutcome`]; nothing here can stop other transfers.

mod error;
mod handler;

pub use error::TransferError;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EngineConfig, DEFAULT_USER_AGENT};
use crate::http;
use crate::job::Job;
use crate::limiter::RateLimiter;
use crate::scheduler::ProgressHandle;

use handler::TransferHandler;

/// Terminal result of one job's transfer attempt.
#[derive(Debug)]
pub struct TransferOutcome {
    pub job: Job,
    /// Path the body was written to; `None` if no file was created.
    pub resolved_path: Option<PathBuf>,
    pub bytes_written: u64,
    pub error: Option<TransferError>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Outcome for a job that never reached a worker.
    pub fn not_run(job: Job, error: TransferError) -> Self {
        Self {
            job,
            resolved_path: None,
            bytes_written: 0,
            error: Some(error),
        }
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            index: self.job.index,
            url: self.job.url.clone(),
            name: self.job.display_name(),
            path: self.resolved_path.clone(),
            bytes_written: self.bytes_written,
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Serializable view of an outcome (for the JSON report).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub index: usize,
    pub url: String,
    pub name: String,
    pub path: Option<PathBuf>,
    pub bytes_written: u64,
    pub error: Option<String>,
}

/// curl settings for GET transfers.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
        }
    }
}

impl From<&EngineConfig> for TransferOptions {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            ..Self::default()
        }
    }
}

fn configure(
    easy: &mut curl::easy::Easy2<TransferHandler>,
    url: &str,
    opts: &TransferOptions,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(&opts.user_agent)?;
    easy.http_headers(http::browser_headers()?)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // No overall deadline: large files may legitimately take hours.
    easy.low_speed_limit(opts.low_speed_limit)?;
    easy.low_speed_time(opts.low_speed_time)?;
    Ok(())
}

/// Downloads `job` into `output_dir`, reporting bytes to `progress`.
///
/// The output path is resolved when the body starts, not earlier. A failed
/// transfer leaves whatever was written on disk; the outcome names the path.
pub fn transfer(
    job: Job,
    progress: &ProgressHandle,
    limiter: Option<&Arc<RateLimiter>>,
    output_dir: &Path,
    opts: &TransferOptions,
) -> TransferOutcome {
    progress.start();
    tracing::debug!(job = job.index, url = %job.url, "transfer started");

    let handler = TransferHandler::new(
        job.url.clone(),
        job.requested_name.clone(),
        output_dir.to_path_buf(),
        limiter.cloned(),
        progress.clone(),
    );
    let mut easy = curl::easy::Easy2::new(handler);
    let result = match configure(&mut easy, &job.url, opts) {
        Ok(()) => run(&mut easy),
        Err(e) => Err(TransferError::Setup(e)),
    };

    let h = easy.get_ref();
    let resolved_path = h.resolved_path.clone();
    let bytes_written = h.bytes_written;
    match &result {
        Ok(()) => {
            progress.mark_done();
            tracing::debug!(job = job.index, bytes_written, "transfer finished");
        }
        Err(e) => {
            progress.mark_failed(e.to_string());
            if let Some(path) = &resolved_path {
                tracing::warn!(
                    job = job.index,
                    path = %path.display(),
                    bytes_written,
                    "partial file left on disk"
                );
            }
        }
    }

    TransferOutcome {
        job,
        resolved_path,
        bytes_written,
        error: result.err(),
    }
}

fn run(easy: &mut curl::easy::Easy2<TransferHandler>) -> Result<(), TransferError> {
    if let Err(e) = easy.perform() {
        let h = easy.get_mut();
        if let Some(failure) = h.failure.take() {
            return Err(failure);
        }
        return Err(if h.out.is_some() {
            TransferError::Stream(e)
        } else {
            TransferError::Request(e)
        });
    }

    let h = easy.get_mut();
    if let Some(err) = h.status_error() {
        return Err(err);
    }
    // Empty 2xx body: the write callback never ran.
    h.open_output()?;
    h.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, UNKNOWN_SIZE};
    use crate::scheduler::{EntryState, ProgressBoard};

    #[test]
    fn unreachable_host_is_request_error() {
        let dir = tempfile::tempdir().unwrap();
        let board = ProgressBoard::new();
        let handle = board.new_entry("x.bin", UNKNOWN_SIZE);
        // Port 9 on localhost: nothing listens, connection is refused.
        let job = Job::from_spec(JobSpec::parse("http://127.0.0.1:9/x.bin"), 0, UNKNOWN_SIZE);
        let opts = TransferOptions {
            connect_timeout: Duration::from_secs(2),
            ..TransferOptions::default()
        };
        let outcome = transfer(job, &handle, None, dir.path(), &opts);
        assert!(matches!(outcome.error, Some(TransferError::Request(_))));
        assert!(outcome.resolved_path.is_none());
        assert_eq!(outcome.bytes_written, 0);
        assert_eq!(handle.snapshot().state, EntryState::Failed);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn summary_carries_error_text() {
        let job = Job::from_spec(JobSpec::parse("https://h/missing.bin"), 2, UNKNOWN_SIZE);
        let outcome = TransferOutcome::not_run(job, TransferError::Cancelled);
        let s = outcome.summary();
        assert_eq!(s.index, 2);
        assert_eq!(s.name, "missing.bin");
        assert_eq!(s.error.as_deref(), Some("cancelled before start"));
        assert!(!outcome.is_success());
    }
}
