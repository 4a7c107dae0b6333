//! `mdl config` – show where settings live and what they are.

use anyhow::Result;
use mdl_core::config::{self, MdlConfig};
use mdl_core::logging;

pub fn run_config(cfg: &MdlConfig) -> Result<()> {
    println!("config file: {}", config::config_path()?.display());
    println!("log file:    {}", logging::log_file_path()?.display());
    println!();
    print!("{}", cfg.to_toml_string()?);
    Ok(())
}
