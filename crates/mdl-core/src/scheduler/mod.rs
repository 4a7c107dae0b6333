//! Job scheduling: queue, worker pool, progress board and the batch runner.
//!
//! Control flow of one batch: sequential size probe → one progress row per
//! job → render tick → worker pool drains the queue → final flush.

mod pool;
mod progress;
mod queue;
mod render;
mod run;

pub use pool::{ShutdownHandle, WorkerPool};
pub use progress::{EntryState, ProgressBoard, ProgressHandle, ProgressSnapshot};
pub use queue::{JobQueue, QueueError};
pub use render::{
    format_bytes, format_counters, format_eta, format_row, format_status, label_width,
    truncate_label, LogSink, NullSink, ProgressSink, RenderLoop, DEFAULT_RENDER_INTERVAL,
    MAX_LABEL_WIDTH,
};
pub use run::{run_batch, Batch, BatchReport};
