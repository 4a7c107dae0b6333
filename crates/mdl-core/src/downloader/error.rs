//! Job-local transfer errors.

use std::path::PathBuf;

/// Why a single download failed. Never escalates beyond its own job.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// curl could not be configured for this URL (e.g. malformed URL).
    #[error("invalid request: {0}")]
    Setup(#[source] curl::Error),
    /// Connection refused, DNS failure, timeout before any body byte.
    #[error("request failed: {0}")]
    Request(#[source] curl::Error),
    /// Server answered with a non-2xx status.
    #[error("HTTP {code}{}", reason_suffix(.reason))]
    HttpStatus { code: u32, reason: String },
    #[error("cannot create output file in {}: {source}", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Local write failed (e.g. disk full). Partial output stays on disk.
    #[error("write to {} failed: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Connection broke after the body started. Partial output stays on disk.
    #[error("transfer interrupted: {0}")]
    Stream(#[source] curl::Error),
    #[error("worker stopped unexpectedly")]
    WorkerPanicked,
    #[error("cancelled before start")]
    Cancelled,
}

fn reason_suffix(reason: &str) -> String {
    if reason.is_empty() {
        String::new()
    } else {
        format!(" {}", reason)
    }
}

impl TransferError {
    /// HTTP status code, for status failures.
    pub fn http_status(&self) -> Option<u32> {
        match self {
            TransferError::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}
