//! CLI command handlers, one file per command.

mod completions;
mod get;
mod show_config;

pub use completions::{run_completions, run_manpage};
pub use get::{run_get, GetArgs};
pub use show_config::run_config;
