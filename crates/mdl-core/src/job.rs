//! Job definitions and parsing of the `URL[@name]` job syntax.

use serde::Serialize;

use crate::url_model;

/// Placeholder size for downloads whose length is unknown, so progress bars stay well-formed.
pub const UNKNOWN_SIZE: u64 = 1;

/// Separator between a URL and its custom output name (`URL@name`).
pub const NAME_DELIMITER: char = '@';

/// A requested download before size probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    pub url: String,
    /// Custom output name; `None` derives it from the URL.
    pub requested_name: Option<String>,
}

impl JobSpec {
    pub fn new(url: impl Into<String>, requested_name: Option<String>) -> Self {
        Self {
            url: url.into(),
            requested_name: requested_name.filter(|n| !n.is_empty()),
        }
    }

    /// Parses `URL` or `URL@name`.
    ///
    /// The name is the text after the last `@`, used only when it is non-empty
    /// and contains no `/` (so `https://user@host/path` stays a plain URL).
    /// `URL@` with an empty name means "derive the name".
    pub fn parse(arg: &str) -> Self {
        let arg = arg.trim();
        match arg.rsplit_once(NAME_DELIMITER) {
            Some((url, name)) if !name.contains('/') => {
                Self::new(url.trim(), Some(name.trim().to_string()))
            }
            _ => Self::new(arg, None),
        }
    }

    pub fn display_name(&self) -> String {
        url_model::display_name(self.requested_name.as_deref(), &self.url)
    }
}

/// Parses a job list: one `URL[@name]` per line; blank lines and `#` comments are skipped.
pub fn parse_job_list(text: &str) -> Vec<JobSpec> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(JobSpec::parse)
        .collect()
}

/// One download, immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub url: String,
    pub requested_name: Option<String>,
    /// Probed content length, or [`UNKNOWN_SIZE`]. Only sizes progress bars.
    pub size_hint: u64,
    /// Position in the input list; keys the job's progress row.
    pub index: usize,
}

impl Job {
    pub fn from_spec(spec: JobSpec, index: usize, size_hint: u64) -> Self {
        Self {
            url: spec.url,
            requested_name: spec.requested_name,
            size_hint: size_hint.max(UNKNOWN_SIZE),
            index,
        }
    }

    pub fn size_known(&self) -> bool {
        self.size_hint > UNKNOWN_SIZE
    }

    pub fn display_name(&self) -> String {
        url_model::display_name(self.requested_name.as_deref(), &self.url)
    }
}
