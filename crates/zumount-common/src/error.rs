//! Error types for zumount.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`ZumountError`].
pub type ZumountResult<T> = Result<T, ZumountError>;

/// Errors that abort a clean run.
///
/// Conditions that are recovered locally (a mount table vanishing mid-scan,
/// an unmount reporting "not mounted") never surface as one of these.
#[derive(Error, Diagnostic, Debug)]
pub enum ZumountError {
    /// Listing the pool's datasets failed for a reason other than the pool
    /// not existing.
    #[error("Failed to list datasets of pool {pool}: {message}")]
    #[diagnostic(
        code(zumount::pool::listing),
        help("Check that the zfs tool is installed and the pool is imported")
    )]
    PoolListing {
        /// The pool being listed.
        pool: String,
        /// Tool output or spawn error.
        message: String,
    },

    /// A name returned by the storage system is not a valid dataset name.
    #[error("Invalid dataset name: {name:?}")]
    #[diagnostic(code(zumount::dataset::invalid))]
    InvalidDataset {
        /// The rejected name.
        name: String,
    },

    /// No per-process mount tables were found at all.
    #[error("No mount tables found matching {pattern}")]
    #[diagnostic(
        code(zumount::scan::no_mount_tables),
        help("zumount must run in the host PID namespace with /proc mounted")
    )]
    NoMountTables {
        /// The glob pattern that matched nothing.
        pattern: String,
    },

    /// A pass finished with exactly as many mounts as it started with.
    #[error("No progress unmounting {dataset}: {remaining} mount(s) remain after pass {pass}")]
    #[diagnostic(
        code(zumount::converge::no_progress),
        help("Something keeps the dataset busy or remounts it; inspect /proc/*/mounts")
    )]
    NoProgress {
        /// The dataset being cleared.
        dataset: String,
        /// Mounts still present.
        remaining: usize,
        /// Pass that made no progress (1-based).
        pass: u32,
    },

    /// The pass ceiling was reached while mounts still remained.
    #[error("Retry ceiling exceeded unmounting {dataset}: {remaining} mount(s) remain after {passes} pass(es)")]
    #[diagnostic(
        code(zumount::converge::retry_ceiling),
        help("Raise --max-passes if mounts are being removed slowly")
    )]
    RetryCeilingExceeded {
        /// The dataset being cleared.
        dataset: String,
        /// Mounts still present.
        remaining: usize,
        /// Passes attempted.
        passes: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(zumount::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl ZumountError {
    /// The dataset this error is about, if it concerns a single dataset.
    #[must_use]
    pub fn dataset(&self) -> Option<&str> {
        match self {
            Self::NoProgress { dataset, .. } | Self::RetryCeilingExceeded { dataset, .. } => {
                Some(dataset.as_str())
            }
            Self::InvalidDataset { name } => Some(name.as_str()),
            _ => None,
        }
    }
}
