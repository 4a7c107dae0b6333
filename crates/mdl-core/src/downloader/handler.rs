//! Easy2 handler for one streamed GET.
//!
//! Checks the final status before the first body byte, claims the output
//! file at that moment, then routes every chunk through the rate limiter,
//! the file and the progress row.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str;
use std::sync::Arc;

use crate::http::{self, StatusLine};
use crate::limiter::RateLimiter;
use crate::resolver;
use crate::scheduler::ProgressHandle;

use super::TransferError;

pub(super) struct TransferHandler {
    pub(super) url: String,
    pub(super) requested_name: Option<String>,
    pub(super) output_dir: PathBuf,
    pub(super) limiter: Option<Arc<RateLimiter>>,
    pub(super) progress: ProgressHandle,
    /// Status of the response currently being received (reset on every status line).
    pub(super) status: Option<StatusLine>,
    pub(super) content_length: Option<u64>,
    pub(super) out: Option<BufWriter<File>>,
    pub(super) resolved_path: Option<PathBuf>,
    pub(super) bytes_written: u64,
    /// Why the handler aborted the transfer, if it did.
    pub(super) failure: Option<TransferError>,
}

impl TransferHandler {
    pub(super) fn new(
        url: String,
        requested_name: Option<String>,
        output_dir: PathBuf,
        limiter: Option<Arc<RateLimiter>>,
        progress: ProgressHandle,
    ) -> Self {
        Self {
            url,
            requested_name,
            output_dir,
            limiter,
            progress,
            status: None,
            content_length: None,
            out: None,
            resolved_path: None,
            bytes_written: 0,
            failure: None,
        }
    }

    /// Error for a non-2xx final status, if any.
    pub(super) fn status_error(&self) -> Option<TransferError> {
        match &self.status {
            Some(s) if !s.is_success() => Some(TransferError::HttpStatus {
                code: s.code,
                reason: s.reason.clone(),
            }),
            _ => None,
        }
    }

    /// Creates the output file under a collision-free name. Called once, right
    /// before the first body byte (or after an empty successful response).
    pub(super) fn open_output(&mut self) -> Result<(), TransferError> {
        if self.out.is_some() {
            return Ok(());
        }
        let (path, file) = resolver::create_unique(
            self.requested_name.as_deref(),
            &self.url,
            &self.output_dir,
        )
        .map_err(|source| TransferError::CreateFile {
            path: self.output_dir.clone(),
            source,
        })?;
        tracing::debug!(url = %self.url, path = %path.display(), "writing");
        self.resolved_path = Some(path);
        self.out = Some(BufWriter::with_capacity(64 * 1024, file));
        Ok(())
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransferError> {
        if self.out.is_none() {
            if let Some(err) = self.status_error() {
                return Err(err);
            }
            if let Some(len) = self.content_length {
                self.progress.set_total(len);
            }
            self.open_output()?;
        }
        if let Some(limiter) = &self.limiter {
            limiter.consume(data.len());
        }
        if let Some(out) = self.out.as_mut() {
            out.write_all(data).map_err(|source| TransferError::Write {
                path: self.resolved_path.clone().unwrap_or_default(),
                source,
            })?;
        }
        self.bytes_written += data.len() as u64;
        self.progress.advance(data.len() as u64);
        Ok(())
    }

    /// Flushes buffered output; call after a successful transfer.
    pub(super) fn flush(&mut self) -> Result<(), TransferError> {
        if let Some(out) = self.out.as_mut() {
            out.flush().map_err(|source| TransferError::Write {
                path: self.resolved_path.clone().unwrap_or_default(),
                source,
            })?;
        }
        Ok(())
    }
}

impl curl::easy::Handler for TransferHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(line) = str::from_utf8(data) {
            if let Some(status) = http::parse_status_line(line) {
                self.status = Some(status);
                self.content_length = None;
            } else if let Some(n) = http::content_length(line) {
                self.content_length = Some(n);
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        match self.write_chunk(data) {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                self.failure = Some(e);
                Ok(0) // abort transfer
            }
        }
    }
}
