//! CLI definition and handler.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use zumount_common::ZumountResult;

use crate::config::CleanConfig;
use crate::converge::Cleaner;
use crate::unmount::UnmountStrategy;

/// Unmount every filesystem and snapshot of a ZFS pool from every mount
/// namespace on this host.
///
/// Run in the host mount and PID namespaces, before destroying or exporting
/// the pool.
#[derive(Parser, Debug)]
#[command(name = "zumount")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// ZFS pool to unmount
    pub pool: String,

    /// TOML configuration file
    #[arg(long, env = "ZUMOUNT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum unmount passes per dataset
    #[arg(long, env = "ZUMOUNT_MAX_PASSES", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_passes: Option<u32>,

    /// Procfs root holding per-process mount tables
    #[arg(long, env = "ZUMOUNT_PROC_ROOT")]
    pub proc_root: Option<PathBuf>,

    /// How mounts are targeted inside each namespace
    #[arg(long, value_enum, env = "ZUMOUNT_STRATEGY")]
    pub strategy: Option<UnmountStrategy>,

    /// Path to the zfs binary
    #[arg(long)]
    pub zfs: Option<PathBuf>,

    /// Path to the nsenter binary
    #[arg(long)]
    pub nsenter: Option<PathBuf>,

    /// Path to the umount binary
    #[arg(long)]
    pub umount: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Resolve the effective configuration: defaults, then the config file,
    /// then flags and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded.
    pub fn clean_config(&self) -> ZumountResult<CleanConfig> {
        let mut config = match &self.config {
            Some(path) => CleanConfig::load(path)?,
            None => CleanConfig::default(),
        };

        if let Some(max_passes) = self.max_passes {
            config = config.with_max_passes(max_passes);
        }
        if let Some(root) = &self.proc_root {
            config = config.with_proc_root(root);
        }
        if let Some(strategy) = self.strategy {
            config = config.with_strategy(strategy);
        }
        if let Some(zfs) = &self.zfs {
            config = config.with_zfs_binary(zfs);
        }
        if let Some(nsenter) = &self.nsenter {
            config = config.with_nsenter_binary(nsenter);
        }
        if let Some(umount) = &self.umount {
            config = config.with_umount_binary(umount);
        }

        config.validate()?;
        Ok(config)
    }

    /// Install the tracing subscriber for this invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the log filter directive is invalid.
    pub fn init_tracing(&self) -> Result<()> {
        let level = if self.debug { "zumount=debug" } else { "zumount=info" };
        let filter = EnvFilter::from_default_env().add_directive(level.parse()?);
        let registry = tracing_subscriber::registry().with(filter);

        match self.log_format {
            LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
            LogFormat::Json => registry.with(fmt::layer().json()).init(),
        }
        Ok(())
    }

    /// Run the clean.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the pool cannot be fully
    /// unmounted.
    pub fn execute(&self) -> Result<()> {
        let config = self.clean_config()?;

        if !rustix::process::geteuid().is_root() {
            tracing::warn!("Not running as root, namespace entry and unmounts will likely fail");
        }

        tracing::debug!(pool = %self.pool, ?config, "Starting clean");
        let report = match Cleaner::from_config(&config).clean(&self.pool) {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(
                    pool = %self.pool,
                    dataset = err.dataset(),
                    error = %err,
                    "Clean failed"
                );
                return Err(err.into());
            }
        };

        tracing::info!(
            pool = %report.pool,
            datasets = report.datasets.len(),
            unmount_calls = report.unmount_calls(),
            "Clean complete"
        );
        Ok(())
    }
}
