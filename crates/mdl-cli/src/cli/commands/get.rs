//! `mdl get` – download a batch of URLs with a fixed worker pool.

use anyhow::{Context, Result};
use mdl_core::config::{EngineConfig, MdlConfig};
use mdl_core::job::{self, JobSpec};
use mdl_core::scheduler::{Batch, BatchReport, ProgressSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::progress_bars::{BarSink, PlainSink};

/// Flags of `mdl get`; `None` falls back to the config file.
#[derive(Debug, Default)]
pub struct GetArgs {
    pub jobs: Vec<String>,
    pub workers: Option<usize>,
    pub limit_kib: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub input_file: Option<PathBuf>,
    pub json: bool,
    pub no_progress: bool,
}

pub async fn run_get(cfg: &MdlConfig, args: GetArgs) -> Result<()> {
    let specs = collect_specs(&args.jobs, args.input_file.as_deref())?;
    if specs.is_empty() {
        anyhow::bail!("nothing to download: pass URL[@NAME] arguments or --input-file");
    }
    let engine = engine_config(cfg, &args);
    engine.validate()?;

    let sink: Arc<dyn ProgressSink> = if args.json || args.no_progress {
        Arc::new(PlainSink::new())
    } else {
        let labels: Vec<String> = specs.iter().map(JobSpec::display_name).collect();
        Arc::new(BarSink::new(&labels))
    };

    let batch = Batch::new(specs, engine);
    let shutdown = batch.shutdown_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted: letting active downloads finish, skipping the rest");
            shutdown.shutdown();
        }
    });

    let report = batch.run(sink).await;
    ctrl_c.abort();
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

/// Jobs from the command line first, then from the input file, in order.
fn collect_specs(args: &[String], input_file: Option<&Path>) -> Result<Vec<JobSpec>> {
    let mut specs: Vec<JobSpec> = args.iter().map(|a| JobSpec::parse(a)).collect();
    if let Some(path) = input_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read job list {}", path.display()))?;
        specs.extend(job::parse_job_list(&text));
    }
    Ok(specs)
}

fn engine_config(cfg: &MdlConfig, args: &GetArgs) -> EngineConfig {
    let mut engine = EngineConfig::from_config(cfg);
    if let Some(n) = args.workers {
        engine.worker_count = n;
    }
    if let Some(kib) = args.limit_kib {
        engine.bandwidth_cap_bytes_per_sec = kib.saturating_mul(1024);
    }
    if let Some(dir) = &args.output_dir {
        engine.output_dir = dir.clone();
    }
    engine
}

fn print_summary(report: &BatchReport) {
    println!("All downloads finished in: {}", report.output_dir.display());
    if report.failed > 0 {
        println!(
            "{} of {} download(s) failed{}",
            report.failed,
            report.total(),
            if report.cancelled > 0 {
                format!(" ({} cancelled)", report.cancelled)
            } else {
                String::new()
            }
        );
    }
}
