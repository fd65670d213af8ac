//! Convergence loop.
//!
//! For each dataset, leaf-first: scan every namespace for mounts, unmount
//! what was found, scan again, and repeat until nothing is mounted. A pass
//! that ends with as many mounts as it started with, or running out of
//! passes, aborts the whole clean.

use std::collections::HashSet;

use zumount_common::{DatasetName, ProcPaths, ZumountError, ZumountResult};

use crate::config::{CleanConfig, DEFAULT_MAX_PASSES};
use crate::dataset::{self, DatasetSource, ZfsCli};
use crate::namespace::{MountRecord, MountScanner, NamespacePid, ProcMountScanner};
use crate::unmount::{
    NsenterUnmounter, UnmountOutcome, UnmountStrategy, UnmountTarget, Unmounter,
};

/// Outcome of clearing one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    /// The dataset cleared.
    pub dataset: DatasetName,
    /// Unmount passes needed; 0 when nothing was mounted.
    pub passes: u32,
    /// Unmount attempts issued across all passes.
    pub unmount_calls: usize,
}

/// Outcome of a whole clean run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    /// Pool that was cleaned.
    pub pool: String,
    /// Per-dataset results, in the order processed.
    pub datasets: Vec<DatasetReport>,
}

impl CleanReport {
    /// Total unmount attempts across all datasets.
    #[must_use]
    pub fn unmount_calls(&self) -> usize {
        self.datasets.iter().map(|d| d.unmount_calls).sum()
    }
}

/// Drives the convergence loop over every dataset of a pool.
#[derive(Debug, Clone)]
pub struct Cleaner<D, S, U> {
    datasets: D,
    scanner: S,
    unmounter: U,
    max_passes: u32,
    strategy: UnmountStrategy,
}

impl Cleaner<ZfsCli, ProcMountScanner, NsenterUnmounter> {
    /// Build a cleaner that talks to the host tools named in `config`.
    #[must_use]
    pub fn from_config(config: &CleanConfig) -> Self {
        let paths = ProcPaths::with_root(&config.proc_root);
        let unmounter = NsenterUnmounter::new()
            .with_nsenter(&config.nsenter_binary)
            .with_umount(&config.umount_binary)
            .with_namespaces(config.namespaces)
            .with_proc_paths(paths.clone());

        Self::new(
            ZfsCli::new(&config.zfs_binary),
            ProcMountScanner::new(paths),
            unmounter,
        )
        .with_max_passes(config.max_passes)
        .with_strategy(config.strategy)
    }
}

impl<D, S, U> Cleaner<D, S, U>
where
    D: DatasetSource,
    S: MountScanner,
    U: Unmounter,
{
    /// Create a cleaner from its three collaborators.
    pub const fn new(datasets: D, scanner: S, unmounter: U) -> Self {
        Self {
            datasets,
            scanner,
            unmounter,
            max_passes: DEFAULT_MAX_PASSES,
            strategy: UnmountStrategy::AllTargets,
        }
    }

    /// Set the pass ceiling per dataset.
    #[must_use]
    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Set the unmount strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: UnmountStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Unmount every dataset of `pool` from every namespace.
    ///
    /// Datasets are processed leaf-first. The first dataset that cannot be
    /// cleared aborts the run; later datasets are not attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails, no mount tables exist, or a
    /// dataset stops making progress or exhausts its passes.
    pub fn clean(&self, pool: &str) -> ZumountResult<CleanReport> {
        let datasets = dataset::list_leaf_first(&self.datasets, pool)?;
        tracing::info!(pool, count = datasets.len(), "Unmounting datasets leaf-first");

        let mut report = CleanReport {
            pool: pool.to_string(),
            datasets: Vec::with_capacity(datasets.len()),
        };
        for dataset in &datasets {
            report.datasets.push(self.unmount_all(dataset)?);
        }

        tracing::info!(
            pool,
            datasets = report.datasets.len(),
            unmount_calls = report.unmount_calls(),
            "Pool unmounted from all namespaces"
        );
        Ok(report)
    }

    /// Repeat scan and unmount for one dataset until no mounts remain.
    ///
    /// # Errors
    ///
    /// Returns [`ZumountError::NoProgress`] when a pass leaves the mount
    /// count unchanged, [`ZumountError::RetryCeilingExceeded`] when the pass
    /// ceiling is reached, and any scanner error.
    pub fn unmount_all(&self, dataset: &DatasetName) -> ZumountResult<DatasetReport> {
        let mut report = DatasetReport {
            dataset: dataset.clone(),
            passes: 0,
            unmount_calls: 0,
        };

        let mut mounts = self.scanner.scan(dataset)?;
        while !mounts.is_empty() {
            if report.passes >= self.max_passes {
                return Err(ZumountError::RetryCeilingExceeded {
                    dataset: dataset.to_string(),
                    remaining: mounts.len(),
                    passes: report.passes,
                });
            }
            report.passes += 1;

            let before = mounts.len();
            tracing::debug!(%dataset, pass = report.passes, mounts = before, "Unmounting");
            report.unmount_calls += self.unmount_pass(dataset, &mounts);

            mounts = self.scanner.scan(dataset)?;
            if !mounts.is_empty() && mounts.len() == before {
                return Err(ZumountError::NoProgress {
                    dataset: dataset.to_string(),
                    remaining: before,
                    pass: report.passes,
                });
            }
        }

        tracing::info!(
            %dataset,
            passes = report.passes,
            unmount_calls = report.unmount_calls,
            "Dataset unmounted"
        );
        Ok(report)
    }

    /// Attempt every unmount for one pass. Returns the number of attempts.
    fn unmount_pass(&self, dataset: &DatasetName, mounts: &[MountRecord]) -> usize {
        let mut calls = 0;
        match self.strategy {
            UnmountStrategy::AllTargets => {
                let mut seen = HashSet::new();
                for record in mounts {
                    if seen.insert(record.namespace_key()) {
                        self.attempt(record.pid, UnmountTarget::AllTargets(dataset));
                        calls += 1;
                    }
                }
            }
            UnmountStrategy::Mountpoint => {
                let mut seen = HashSet::new();
                for record in mounts {
                    if seen.insert((record.namespace_key(), record.mountpoint.as_path())) {
                        self.attempt(record.pid, UnmountTarget::Mountpoint(&record.mountpoint));
                        calls += 1;
                    }
                }
            }
        }
        calls
    }

    fn attempt(&self, pid: NamespacePid, target: UnmountTarget<'_>) {
        match self.unmounter.unmount(pid, target) {
            UnmountOutcome::Unmounted => {
                tracing::info!(pid, %target, "Unmounted in namespace");
            }
            UnmountOutcome::NotMounted => {
                tracing::debug!(pid, %target, "Already unmounted in namespace");
            }
            UnmountOutcome::Failed { message } => {
                tracing::warn!(pid, %target, %message, "Unmount failed, will re-scan");
            }
        }
    }
}
