//! Progress rendering: the sink trait, the fixed-interval render tick and row formatting.

use std::sync::Arc;
use std::time::Duration;

use super::progress::{EntryState, ProgressBoard, ProgressSnapshot};
use crate::downloader::TransferError;

/// Labels longer than this are truncated in progress rows.
pub const MAX_LABEL_WIDTH: usize = 25;

/// Default redraw interval of the render tick.
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(180);

/// Destination for progress rows (terminal bars, log lines, tests).
///
/// `render` is called from the tick with every row; `job_failed` is called
/// from a worker the moment a job fails; `finish` receives the final state.
pub trait ProgressSink: Send + Sync {
    fn render(&self, rows: &[ProgressSnapshot]);

    fn job_failed(&self, label: &str, error: &TransferError);

    fn finish(&self, rows: &[ProgressSnapshot]) {
        self.render(rows);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn render(&self, _rows: &[ProgressSnapshot]) {}

    fn job_failed(&self, _label: &str, _error: &TransferError) {}
}

/// Sink that reports through `tracing` (for non-interactive runs).
/// Logs a row only when its state changes, plus every failure and a final line per job.
#[derive(Debug, Default)]
pub struct LogSink {
    last_states: std::sync::Mutex<Vec<EntryState>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows whose state differs from the previous call; remembers the new states.
    fn changed<'a>(&self, rows: &'a [ProgressSnapshot]) -> Vec<&'a ProgressSnapshot> {
        let mut last = self.last_states.lock().unwrap_or_else(|e| e.into_inner());
        let new_len = rows.len().max(last.len());
        last.resize(new_len, EntryState::Pending);
        rows.iter()
            .filter(|row| {
                let seen = &mut last[row.index];
                let changed = *seen != row.state;
                *seen = row.state;
                changed
            })
            .collect()
    }
}

impl ProgressSink for LogSink {
    fn render(&self, rows: &[ProgressSnapshot]) {
        for row in self.changed(rows) {
            tracing::info!(job = row.index, state = ?row.state, "{}", format_row(row, MAX_LABEL_WIDTH));
        }
    }

    fn job_failed(&self, label: &str, error: &TransferError) {
        tracing::warn!("failed: {}: {}", label, error);
    }
}

/// Background tick that renders the board every `interval` until finished.
pub struct RenderLoop {
    stop_tx: tokio::sync::oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
    board: Arc<ProgressBoard>,
    sink: Arc<dyn ProgressSink>,
}

impl RenderLoop {
    /// Spawns the tick on the current tokio runtime.
    pub fn spawn(board: Arc<ProgressBoard>, sink: Arc<dyn ProgressSink>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
        let tick_board = Arc::clone(&board);
        let tick_sink = Arc::clone(&sink);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => tick_board.render(tick_sink.as_ref()),
                    _ = &mut stop_rx => break,
                }
            }
        });
        Self {
            stop_tx,
            handle,
            board,
            sink,
        }
    }

    /// Stops the tick and performs the final render so the last bytes are shown.
    /// Returns the final snapshot.
    pub async fn finish(self) -> Vec<ProgressSnapshot> {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!("render tick ended abnormally: {}", e);
        }
        let rows = self.board.snapshot();
        self.sink.finish(&rows);
        rows
    }
}

/// Width of the label column: longest label, capped at [`MAX_LABEL_WIDTH`].
pub fn label_width<'a>(labels: impl IntoIterator<Item = &'a str>) -> usize {
    labels
        .into_iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .min(MAX_LABEL_WIDTH)
}

/// Truncates `label` to `width` characters, ending in `...` when shortened.
pub fn truncate_label(label: &str, width: usize) -> String {
    let len = label.chars().count();
    if len <= width {
        return label.to_string();
    }
    if width <= 3 {
        return label.chars().take(width).collect();
    }
    let mut out: String = label.chars().take(width - 3).collect();
    out.push_str("...");
    out
}

/// Human-readable byte count in binary units (`512 B`, `1.5 KiB`, `3.2 MiB`).
pub fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if n < 1024 {
        return format!("{} B", n);
    }
    let mut value = n as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// `done / total` counters; the total is `?` while the size is unknown.
pub fn format_counters(row: &ProgressSnapshot) -> String {
    if row.size_known || row.state == EntryState::Done {
        format!("{} / {}", format_bytes(row.completed), format_bytes(row.total))
    } else {
        format!("{} / ?", format_bytes(row.completed))
    }
}

/// `MM:SS` (or `H:MM:SS` beyond an hour).
pub fn format_eta(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Everything after the label: counters, percent, then ETA / ✓ / ✗.
pub fn format_status(row: &ProgressSnapshot) -> String {
    let tail = match row.state {
        EntryState::Pending => "queued".to_string(),
        EntryState::Active => row.eta().map(format_eta).unwrap_or_else(|| "--:--".to_string()),
        EntryState::Done => "✓".to_string(),
        EntryState::Failed => "✗".to_string(),
    };
    let percent = if row.size_known || row.state == EntryState::Done {
        format!("{:>3.0}%", row.percent())
    } else {
        "  ?%".to_string()
    };
    format!("{}  {}  {}", format_counters(row), percent, tail)
}

/// One plain-text progress row: padded label, then [`format_status`].
pub fn format_row(row: &ProgressSnapshot, width: usize) -> String {
    format!(
        "{:<width$} | {}",
        truncate_label(&row.label, width),
        format_status(row),
        width = width
    )
}
