//! Per-job progress counters shared between workers and the render tick.
//!
//! Each entry is a set of atomics: the worker that owns a job advances its
//! entry without taking a lock, and the render tick reads all entries as
//! [`ProgressSnapshot`]s. Rows are keyed by job index, never by completion order.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use crate::job::UNKNOWN_SIZE;

/// Lifecycle of one progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Active,
    Done,
    Failed,
}

impl EntryState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EntryState::Active,
            2 => EntryState::Done,
            3 => EntryState::Failed,
            _ => EntryState::Pending,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            EntryState::Pending => 0,
            EntryState::Active => 1,
            EntryState::Done => 2,
            EntryState::Failed => 3,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, EntryState::Done | EntryState::Failed)
    }
}

#[derive(Debug)]
struct Entry {
    label: String,
    total: AtomicU64,
    completed: AtomicU64,
    size_known: AtomicBool,
    state: AtomicU8,
    started_at: OnceLock<Instant>,
    finished_after: OnceLock<Duration>,
    failure: OnceLock<String>,
}

/// Thread-safe table of progress entries, one per job.
#[derive(Debug, Default)]
pub struct ProgressBoard {
    entries: RwLock<Vec<Arc<Entry>>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row with the given label and total; `total <= 1` marks the size as unknown.
    /// Rows are indexed in creation order, which must match job indices.
    pub fn new_entry(&self, label: impl Into<String>, total: u64) -> ProgressHandle {
        let size_known = total > UNKNOWN_SIZE;
        let entry = Arc::new(Entry {
            label: label.into(),
            total: AtomicU64::new(total.max(UNKNOWN_SIZE)),
            completed: AtomicU64::new(0),
            size_known: AtomicBool::new(size_known),
            state: AtomicU8::new(EntryState::Pending.as_u8()),
            started_at: OnceLock::new(),
            finished_after: OnceLock::new(),
            failure: OnceLock::new(),
        });
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let index = entries.len();
        entries.push(Arc::clone(&entry));
        ProgressHandle { index, entry }
    }

    /// Handle for an existing row.
    pub fn handle(&self, index: usize) -> Option<ProgressHandle> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(index).map(|entry| ProgressHandle {
            index,
            entry: Arc::clone(entry),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent view of every row, in index order.
    pub fn snapshot(&self) -> Vec<ProgressSnapshot> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .enumerate()
            .map(|(index, e)| snapshot_entry(index, e))
            .collect()
    }

    /// Hands the current snapshot to `sink`.
    pub fn render(&self, sink: &dyn super::render::ProgressSink) {
        sink.render(&self.snapshot());
    }
}

fn snapshot_entry(index: usize, e: &Entry) -> ProgressSnapshot {
    let state = EntryState::from_u8(e.state.load(Ordering::Acquire));
    let size_known = e.size_known.load(Ordering::Acquire);
    let mut completed = e.completed.load(Ordering::Acquire);
    let mut total = e.total.load(Ordering::Acquire);
    if size_known {
        completed = completed.min(total);
    } else if state == EntryState::Done {
        total = completed;
    } else {
        // The writer bumps `completed` before growing `total`; never show the gap.
        total = total.max(completed).max(UNKNOWN_SIZE);
    }
    let elapsed = match (e.finished_after.get(), e.started_at.get()) {
        (Some(d), _) => Some(*d),
        (None, Some(start)) => Some(start.elapsed()),
        (None, None) => None,
    };
    ProgressSnapshot {
        index,
        label: e.label.clone(),
        total,
        completed,
        size_known,
        state,
        elapsed,
        failure: e.failure.get().cloned(),
    }
}

/// Write side of one progress row. Owned by the single worker running the job.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    index: usize,
    entry: Arc<Entry>,
}

impl ProgressHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.entry.label
    }

    /// Marks the row active and starts its clock (used for rate and ETA).
    pub fn start(&self) {
        let _ = self.entry.started_at.set(Instant::now());
        self.entry
            .state
            .store(EntryState::Active.as_u8(), Ordering::Release);
    }

    /// Records `delta` more bytes. Known totals are never exceeded; an unknown
    /// total grows along with `completed`.
    pub fn advance(&self, delta: u64) {
        if delta == 0 {
            return;
        }
        let e = &self.entry;
        if e.size_known.load(Ordering::Acquire) {
            let total = e.total.load(Ordering::Acquire);
            let _ = e
                .completed
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                    Some(c.saturating_add(delta).min(total))
                });
        } else {
            let now = e.completed.fetch_add(delta, Ordering::AcqRel) + delta;
            e.total.fetch_max(now, Ordering::AcqRel);
        }
    }

    /// Replaces an unknown total with a length learned later (e.g. from the GET response).
    /// Ignored when the total is already known or `total` is not a real length.
    pub fn set_total(&self, total: u64) {
        let e = &self.entry;
        if total <= UNKNOWN_SIZE || e.size_known.load(Ordering::Acquire) {
            return;
        }
        let completed = e.completed.load(Ordering::Acquire);
        e.total.store(total.max(completed), Ordering::Release);
        e.size_known.store(true, Ordering::Release);
    }

    pub fn mark_done(&self) {
        let e = &self.entry;
        if !e.size_known.load(Ordering::Acquire) {
            // The real size is now known: whatever arrived, possibly nothing.
            e.total.store(e.completed.load(Ordering::Acquire), Ordering::Release);
        }
        self.finish(EntryState::Done);
    }

    pub fn mark_failed(&self, message: impl Into<String>) {
        let _ = self.entry.failure.set(message.into());
        self.finish(EntryState::Failed);
    }

    fn finish(&self, state: EntryState) {
        if let Some(start) = self.entry.started_at.get() {
            let _ = self.entry.finished_after.set(start.elapsed());
        }
        self.entry.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        snapshot_entry(self.index, &self.entry)
    }
}

/// Point-in-time view of one progress row (render-friendly).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub index: usize,
    pub label: String,
    /// Total bytes; equals `completed` or more while the size is unknown.
    pub total: u64,
    pub completed: u64,
    pub size_known: bool,
    pub state: EntryState,
    /// Time since the transfer started (frozen once finished).
    #[serde(skip)]
    pub elapsed: Option<Duration>,
    pub failure: Option<String>,
}

impl ProgressSnapshot {
    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).min(1.0)
    }

    /// `completed / total * 100`, clamped to 100.
    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    /// Average transfer rate since start in bytes per second (0 before start).
    pub fn bytes_per_sec(&self) -> f64 {
        match self.elapsed {
            Some(d) if d.as_secs_f64() > 0.0 => self.completed as f64 / d.as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Estimated time remaining; only for active rows with a known size and a measurable rate.
    pub fn eta(&self) -> Option<Duration> {
        if self.state != EntryState::Active || !self.size_known {
            return None;
        }
        let remaining = self.total.saturating_sub(self.completed);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}
