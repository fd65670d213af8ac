//! Unmount execution.
//!
//! Enters one process's namespaces with `nsenter` and runs a forced `umount`
//! there. "Not mounted" counts as success so repeated or racing attempts are
//! harmless.

mod nsenter;

pub use nsenter::{DEFAULT_NSENTER_BINARY, DEFAULT_UMOUNT_BINARY, NsenterUnmounter};

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use zumount_common::DatasetName;

use crate::namespace::NamespacePid;

/// How mounts are targeted inside a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum UnmountStrategy {
    /// Unmount every mount of the dataset in the namespace at once.
    #[default]
    AllTargets,
    /// Unmount each discovered mountpoint individually.
    Mountpoint,
}

impl fmt::Display for UnmountStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllTargets => f.write_str("all-targets"),
            Self::Mountpoint => f.write_str("mountpoint"),
        }
    }
}

/// What to unmount inside a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountTarget<'a> {
    /// Every mount whose source is the dataset.
    AllTargets(&'a DatasetName),
    /// A single mountpoint.
    Mountpoint(&'a Path),
}

impl fmt::Display for UnmountTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllTargets(dataset) => write!(f, "all mounts of {dataset}"),
            Self::Mountpoint(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Result of one unmount attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmountOutcome {
    /// The unmount succeeded.
    Unmounted,
    /// The target was already gone; treated as success.
    NotMounted,
    /// The attempt failed; a later pass may retry.
    Failed {
        /// Tool output or spawn error.
        message: String,
    },
}

/// Removes one mount inside one namespace.
///
/// Implementations never fail the caller: anything that goes wrong is
/// reported as [`UnmountOutcome::Failed`] and the caller re-scans.
pub trait Unmounter {
    /// Unmount `target` inside the namespace of process `pid`.
    fn unmount(&self, pid: NamespacePid, target: UnmountTarget<'_>) -> UnmountOutcome;
}

impl<T: Unmounter + ?Sized> Unmounter for &T {
    fn unmount(&self, pid: NamespacePid, target: UnmountTarget<'_>) -> UnmountOutcome {
        (**self).unmount(pid, target)
    }
}

/// Whether `umount` output says the target was not mounted.
#[must_use]
pub fn reports_not_mounted(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    lower.contains("not mounted")
}
