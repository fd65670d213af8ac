//! Clean configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use zumount_common::paths::DEFAULT_PROC_ROOT;
use zumount_common::{ZumountError, ZumountResult};

use crate::dataset::DEFAULT_ZFS_BINARY;
use crate::namespace::NamespaceKinds;
use crate::unmount::{DEFAULT_NSENTER_BINARY, DEFAULT_UMOUNT_BINARY, UnmountStrategy};

/// Default pass ceiling per dataset.
pub const DEFAULT_MAX_PASSES: u32 = 10;

/// Settings for one clean run.
///
/// Nothing here is process-wide: a config is built per invocation and passed
/// down explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CleanConfig {
    /// Maximum scan/unmount passes per dataset before giving up.
    pub max_passes: u32,
    /// Procfs root holding the per-process mount tables.
    pub proc_root: PathBuf,
    /// `zfs` binary.
    pub zfs_binary: PathBuf,
    /// `nsenter` binary.
    pub nsenter_binary: PathBuf,
    /// `umount` binary, run inside the target namespace.
    pub umount_binary: PathBuf,
    /// Namespaces to join before unmounting.
    pub namespaces: NamespaceKinds,
    /// How mounts are targeted.
    pub strategy: UnmountStrategy,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            zfs_binary: PathBuf::from(DEFAULT_ZFS_BINARY),
            nsenter_binary: PathBuf::from(DEFAULT_NSENTER_BINARY),
            umount_binary: PathBuf::from(DEFAULT_UMOUNT_BINARY),
            namespaces: NamespaceKinds::default(),
            strategy: UnmountStrategy::default(),
        }
    }
}

impl CleanConfig {
    /// Load a configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails validation.
    pub fn load(path: &Path) -> ZumountResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ZumountError::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| ZumountError::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), ?config, "Loaded configuration");
        Ok(config)
    }

    /// Check invariants that deserialization cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_passes` is zero.
    pub fn validate(&self) -> ZumountResult<()> {
        if self.max_passes == 0 {
            return Err(ZumountError::Config {
                message: "max-passes must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set the pass ceiling.
    #[must_use]
    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Set the procfs root.
    #[must_use]
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// Set the `zfs` binary.
    #[must_use]
    pub fn with_zfs_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.zfs_binary = binary.into();
        self
    }

    /// Set the `nsenter` binary.
    #[must_use]
    pub fn with_nsenter_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.nsenter_binary = binary.into();
        self
    }

    /// Set the `umount` binary.
    #[must_use]
    pub fn with_umount_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.umount_binary = binary.into();
        self
    }

    /// Set the namespaces to join.
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: NamespaceKinds) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Set the unmount strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: UnmountStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CleanConfig::default();
        assert_eq!(config.max_passes, 10);
        assert_eq!(config.proc_root, PathBuf::from("/proc"));
        assert_eq!(config.strategy, UnmountStrategy::AllTargets);
        assert!(config.namespaces.mount);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = CleanConfig::default()
            .with_max_passes(5)
            .with_proc_root("/tmp/proc")
            .with_zfs_binary("/sbin/zfs")
            .with_strategy(UnmountStrategy::Mountpoint)
            .with_namespaces(NamespaceKinds::mount_only());

        assert_eq!(config.max_passes, 5);
        assert_eq!(config.proc_root, PathBuf::from("/tmp/proc"));
        assert_eq!(config.zfs_binary, PathBuf::from("/sbin/zfs"));
        assert_eq!(config.strategy, UnmountStrategy::Mountpoint);
        assert!(!config.namespaces.user);
    }

    #[test]
    fn zero_passes_rejected() {
        let err = CleanConfig::default().with_max_passes(0).validate().unwrap_err();
        assert!(matches!(err, ZumountError::Config { .. }));
    }

    #[test]
    fn load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zumount.toml");
        std::fs::write(
            &path,
            r#"
max-passes = 5
strategy = "mountpoint"

[namespaces]
user = false
uts = true
"#,
        )
        .unwrap();

        let config = CleanConfig::load(&path).unwrap();
        assert_eq!(config.max_passes, 5);
        assert_eq!(config.strategy, UnmountStrategy::Mountpoint);
        assert!(config.namespaces.mount);
        assert!(!config.namespaces.user);
        assert!(config.namespaces.uts);
        assert_eq!(config.zfs_binary, PathBuf::from("zfs"));
    }

    #[test]
    fn load_rejects_unknown_keys_and_zero_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zumount.toml");

        std::fs::write(&path, "max-pass = 5\n").unwrap();
        assert!(CleanConfig::load(&path).is_err());

        std::fs::write(&path, "max-passes = 0\n").unwrap();
        assert!(CleanConfig::load(&path).is_err());
    }

    #[test]
    fn load_missing_file() {
        let err = CleanConfig::load(Path::new("/nonexistent/zumount.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
