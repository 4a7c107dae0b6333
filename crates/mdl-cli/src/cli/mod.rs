//! CLI for the mdl multi-file downloader.

mod commands;
mod progress_bars;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdl_core::config;
use std::path::PathBuf;

use commands::{run_completions, run_config, run_get, run_manpage, GetArgs};

/// Top-level CLI for mdl.
#[derive(Debug, Parser)]
#[command(name = "mdl", version)]
#[command(about = "mdl: concurrent, rate-limited multi-file downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more files in parallel.
    Get {
        /// Jobs as `URL` or `URL@NAME` (NAME overrides the output file name).
        #[arg(value_name = "URL[@NAME]")]
        jobs: Vec<String>,
        /// Number of parallel workers (default from config).
        #[arg(short = 'w', long, value_name = "N")]
        workers: Option<usize>,
        /// Total bandwidth cap in KiB/s shared by all workers; 0 = unlimited.
        #[arg(short = 'l', long = "limit", value_name = "KIB")]
        limit_kib: Option<u64>,
        /// Directory to save files into (created if missing).
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Read additional jobs from FILE, one per line (`#` starts a comment).
        #[arg(short = 'i', long, value_name = "FILE")]
        input_file: Option<PathBuf>,
        /// Print the final report as JSON on stdout.
        #[arg(long)]
        json: bool,
        /// Do not draw progress bars; failures are still printed.
        #[arg(long)]
        no_progress: bool,
    },

    /// Show config and log file locations and the effective settings.
    Config,

    /// Generate a shell completion script on stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print the man page (roff) on stdout.
    Manpage,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get {
                jobs,
                workers,
                limit_kib,
                output_dir,
                input_file,
                json,
                no_progress,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let args = GetArgs {
                    jobs,
                    workers,
                    limit_kib,
                    output_dir,
                    input_file,
                    json,
                    no_progress,
                };
                run_get(&cfg, args).await?;
            }
            CliCommand::Config => {
                let cfg = config::load_or_init()?;
                run_config(&cfg)?;
            }
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Manpage => run_manpage()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
