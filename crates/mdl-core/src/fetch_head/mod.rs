//! Size probing via HTTP HEAD.
//!
//! Runs once, sequentially, before any download starts. Its only job is to
//! seed progress totals, so every failure degrades to [`UNKNOWN_SIZE`]
//! instead of aborting the batch.

mod parse;

use anyhow::{Context, Result};
use std::str;
use std::time::Duration;

use crate::http;
use crate::job::{Job, JobSpec, UNKNOWN_SIZE};

/// Result of a HEAD request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResult {
    /// Final status code (after redirects).
    pub status: u32,
    /// Total size in bytes, if `Content-Length` is present on the final response.
    pub content_length: Option<u64>,
}

/// Performs a HEAD request (following redirects) and returns the parsed metadata.
///
/// Non-2xx responses are errors. Runs in the current thread; call from
/// `spawn_blocking` if used from async code.
pub fn probe(url: &str, timeout: Duration, user_agent: &str) -> Result<HeadResult> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?; // HEAD request
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(user_agent)?;
    easy.http_headers(http::browser_headers()?)?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse::parse_headers(&headers))
}

/// Content length for `url`, or [`UNKNOWN_SIZE`] when the probe fails or reports no usable length.
pub fn probe_size(url: &str, timeout: Duration, user_agent: &str) -> u64 {
    match probe(url, timeout, user_agent) {
        Ok(HeadResult {
            content_length: Some(n),
            ..
        }) if n > 0 => n,
        Ok(_) => {
            tracing::debug!(url, "HEAD reported no content length; size unknown");
            UNKNOWN_SIZE
        }
        Err(e) => {
            tracing::warn!(url, "cannot determine size: {:#}", e);
            UNKNOWN_SIZE
        }
    }
}

/// Probes every spec in order and turns it into a [`Job`] with its index and size hint.
pub fn probe_all(specs: Vec<JobSpec>, timeout: Duration, user_agent: &str) -> Vec<Job> {
    probe_all_until(specs, timeout, user_agent, || false)
}

/// Like [`probe_all`], but once `stop()` returns true the remaining specs are
/// not probed and keep [`UNKNOWN_SIZE`].
pub fn probe_all_until(
    specs: Vec<JobSpec>,
    timeout: Duration,
    user_agent: &str,
    stop: impl Fn() -> bool,
) -> Vec<Job> {
    let mut skipped = 0usize;
    let jobs: Vec<Job> = specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| {
            let size = if stop() {
                skipped += 1;
                UNKNOWN_SIZE
            } else {
                probe_size(&spec.url, timeout, user_agent)
            };
            Job::from_spec(spec, index, size)
        })
        .collect();
    if skipped > 0 {
        tracing::info!(skipped, "size probing stopped early");
    }
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    #[test]
    fn stopped_probing_skips_remaining_heads() {
        // Accepts connections at the socket level but never answers.
        let silent = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/", silent.local_addr().unwrap());
        let specs = vec![
            JobSpec::parse(&format!("{base}a.bin")),
            JobSpec::parse(&format!("{base}b.bin@named.bin")),
        ];

        let started = Instant::now();
        let jobs = probe_all_until(specs, Duration::from_secs(5), "mdl-test", || true);

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.size_hint == UNKNOWN_SIZE));
        assert_eq!(jobs[1].index, 1);
        assert_eq!(jobs[1].display_name(), "named.bin");
    }

    #[test]
    fn unreachable_host_degrades_to_unknown_size() {
        let jobs = probe_all(
            vec![JobSpec::parse("http://127.0.0.1:9/x.bin")],
            Duration::from_secs(2),
            "mdl-test",
        );
        assert_eq!(jobs[0].size_hint, UNKNOWN_SIZE);
    }
}
