//! Terminal progress: one indicatif bar per job, failures printed above the bars.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mdl_core::downloader::TransferError;
use mdl_core::scheduler::{
    format_status, label_width, truncate_label, EntryState, LogSink, ProgressSink,
    ProgressSnapshot,
};
use std::sync::Mutex;

const BAR_TEMPLATE: &str = "{prefix} [{bar:30.cyan/blue}] {msg}";
const BAR_CHARS: &str = "=>-";

fn bar_style() -> ProgressStyle {
    match ProgressStyle::with_template(BAR_TEMPLATE) {
        Ok(style) => style.progress_chars(BAR_CHARS),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// Draws the board as a stack of bars, redrawn on every render tick.
pub struct BarSink {
    multi: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
    style: ProgressStyle,
    width: usize,
}

impl BarSink {
    /// `labels` sizes the label column (capped, longer labels are truncated).
    pub fn new(labels: &[String]) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(Vec::new()),
            style: bar_style(),
            width: label_width(labels.iter().map(String::as_str)),
        }
    }

    fn new_bar(&self, row: &ProgressSnapshot) -> ProgressBar {
        let prefix = format!(
            "{:<width$}",
            truncate_label(&row.label, self.width),
            width = self.width
        );
        self.multi.add(
            ProgressBar::new(row.total)
                .with_style(self.style.clone())
                .with_prefix(prefix),
        )
    }
}

impl ProgressSink for BarSink {
    fn render(&self, rows: &[ProgressSnapshot]) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        while bars.len() < rows.len() {
            let bar = self.new_bar(&rows[bars.len()]);
            bars.push(bar);
        }
        for (row, bar) in rows.iter().zip(bars.iter()) {
            if bar.is_finished() {
                continue;
            }
            bar.set_length(row.total);
            bar.set_position(row.completed);
            bar.set_message(format_status(row));
            match row.state {
                EntryState::Done => bar.finish(),
                EntryState::Failed => bar.abandon(),
                EntryState::Pending | EntryState::Active => {}
            }
        }
    }

    fn job_failed(&self, label: &str, error: &TransferError) {
        let _ = self.multi.println(format!("✗ {}: {}", label, error));
    }

    fn finish(&self, rows: &[ProgressSnapshot]) {
        self.render(rows);
        let bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        for bar in bars.iter().filter(|b| !b.is_finished()) {
            bar.abandon();
        }
    }
}

/// No bars: state changes go to the log, each failure is also printed to stderr as it happens.
#[derive(Debug, Default)]
pub struct PlainSink {
    log: LogSink,
}

impl PlainSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for PlainSink {
    fn render(&self, rows: &[ProgressSnapshot]) {
        self.log.render(rows);
    }

    fn job_failed(&self, label: &str, error: &TransferError) {
        eprintln!("✗ {}: {}", label, error);
    }
}
