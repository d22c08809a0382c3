//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and setup code.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_core::pool::PoolConfig;

/// Common CLI arguments for all binaries
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Pool configuration file (JSON); defaults apply when omitted
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// CPU core to pin the main thread to
    #[arg(short = 'c', long)]
    pub cpu_core: Option<usize>,

    /// Enable real-time priority (requires privileges)
    #[arg(long)]
    pub realtime: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

/// Initialize tracing/logging
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    strata_core::utils::init_logger(level, json)
}

/// Setup CPU affinity and real-time priority
pub fn setup_performance(cpu_core: Option<usize>, realtime: bool) -> Result<()> {
    if let Some(core) = cpu_core {
        strata_core::perf::cpu::pin_to_core(core)?;
        tracing::info!("Pinned to CPU core {}", core);
    }

    #[cfg(target_os = "linux")]
    if realtime {
        strata_core::perf::cpu::set_realtime_priority(50)?;
        tracing::info!("Enabled real-time priority");
    }

    #[cfg(not(target_os = "linux"))]
    if realtime {
        tracing::warn!("Real-time priority only supported on Linux");
    }

    Ok(())
}

/// Load the pool config from `path`, or defaults
pub fn load_config(path: Option<&Path>) -> Result<PoolConfig> {
    match path {
        Some(p) => PoolConfig::from_json_file(p)
            .with_context(|| format!("Invalid config {}", p.display())),
        None => Ok(PoolConfig::default()),
    }
}

/// Flag raised by Ctrl+C; the first press asks for a graceful stop
pub fn install_stop_flag() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        tracing::warn!("Ctrl+C received, stopping");
        flag.store(true, Ordering::Release);
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(stop)
}

/// Orders per second, guarding against a zero elapsed time
pub fn rate(count: u64, elapsed: std::time::Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}
