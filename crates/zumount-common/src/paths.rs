//! Paths under `/proc` used to discover mounts and namespaces.

use std::path::{Path, PathBuf};

/// Default procfs mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Paths into a procfs tree.
///
/// The root is configurable so tests can point it at a fake tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcPaths {
    /// Procfs root (default: /proc).
    pub root: PathBuf,
}

impl ProcPaths {
    /// Create paths with the default procfs root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom procfs root.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Glob pattern matching every process's mount table.
    ///
    /// Glob metacharacters in the root are escaped.
    #[must_use]
    pub fn mount_tables_pattern(&self) -> String {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        format!("{root}/*/mounts")
    }

    /// Mount namespace link of one process.
    #[must_use]
    pub fn mount_ns_link(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("ns").join("mnt")
    }

    /// User namespace link of one process.
    #[must_use]
    pub fn user_ns_link(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("ns").join("user")
    }

    /// User namespace link of the calling process.
    #[must_use]
    pub fn self_user_ns_link(&self) -> PathBuf {
        self.root.join("self").join("ns").join("user")
    }

    /// Extract the pid from a mount table path such as `/proc/42/mounts`.
    ///
    /// Only the last two components are inspected, since glob results may
    /// spell the root differently (`./proc` comes back as `proc`). Returns
    /// `None` for tables that do not belong to a numeric process directory
    /// (`/proc/self/mounts`, `/proc/thread-self/mounts`).
    #[must_use]
    pub fn pid_of_mount_table(table: &Path) -> Option<u32> {
        if table.file_name()? != "mounts" {
            return None;
        }
        table.parent()?.file_name()?.to_str()?.parse().ok()
    }
}

impl Default for ProcPaths {
    fn default() -> Self {
        Self::with_root(DEFAULT_PROC_ROOT)
    }
}
