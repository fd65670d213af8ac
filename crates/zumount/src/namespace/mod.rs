//! Mount namespace discovery.
//!
//! Namespaces are never created or managed here. A namespace is referred to
//! through any process living in it, and every process's mount table under
//! `/proc/<pid>/mounts` is scanned to find where a dataset is mounted.

mod scanner;

pub use scanner::{MountEntry, MountScanner, ProcMountScanner, parse_mount_line};

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Which namespaces to join before unmounting.
///
/// Unmount behavior can depend on more than the mount namespace, so by
/// default the user, network and IPC namespaces are joined as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamespaceKinds {
    /// Mount namespace.
    pub mount: bool,
    /// User namespace.
    pub user: bool,
    /// Network namespace.
    pub net: bool,
    /// IPC namespace.
    pub ipc: bool,
    /// UTS namespace.
    pub uts: bool,
}

impl Default for NamespaceKinds {
    fn default() -> Self {
        Self {
            mount: true,
            user: true,
            net: true,
            ipc: true,
            uts: false,
        }
    }
}

impl NamespaceKinds {
    /// Join only the mount namespace.
    #[must_use]
    pub const fn mount_only() -> Self {
        Self {
            mount: true,
            user: false,
            net: false,
            ipc: false,
            uts: false,
        }
    }

    /// `nsenter` flags selecting these namespaces.
    #[must_use]
    pub fn to_nsenter_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();

        if self.mount {
            flags.push("--mount");
        }
        if self.user {
            flags.push("--user");
        }
        if self.net {
            flags.push("--net");
        }
        if self.ipc {
            flags.push("--ipc");
        }
        if self.uts {
            flags.push("--uts");
        }

        flags
    }
}

/// A process id standing in for the mount namespace it lives in.
pub type NamespacePid = u32;

/// One place a dataset is mounted, as seen from one process's mount table.
///
/// Records are rebuilt on every scan and never reused: mount state may
/// change between any two scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    /// Process whose mount table showed the mount.
    pub pid: NamespacePid,
    /// Mount namespace identity (`mnt:[inode]`) when it could be read.
    pub namespace: Option<String>,
    /// Where the dataset is mounted inside that namespace.
    pub mountpoint: PathBuf,
}

impl MountRecord {
    /// Key that groups records by namespace: the namespace identity when
    /// known, the pid otherwise.
    #[must_use]
    pub fn namespace_key(&self) -> NamespaceKey<'_> {
        self.namespace
            .as_deref()
            .map_or(NamespaceKey::Pid(self.pid), NamespaceKey::Inode)
    }
}

/// Grouping key for [`MountRecord::namespace_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKey<'a> {
    /// Namespace identity read from `/proc/<pid>/ns/mnt`.
    Inode(&'a str),
    /// Identity unknown; the pid is its own group.
    Pid(NamespacePid),
}

impl fmt::Display for NamespaceKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inode(inode) => f.write_str(inode),
            Self::Pid(pid) => write!(f, "pid:{pid}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kinds_join_mount_user_net_ipc() {
        assert_eq!(
            NamespaceKinds::default().to_nsenter_flags(),
            ["--mount", "--user", "--net", "--ipc"]
        );
    }

    #[test]
    fn mount_only_and_uts() {
        assert_eq!(NamespaceKinds::mount_only().to_nsenter_flags(), ["--mount"]);
        let kinds = NamespaceKinds {
            uts: true,
            ..NamespaceKinds::default()
        };
        assert_eq!(kinds.to_nsenter_flags().len(), 5);
    }

    #[test]
    fn namespace_key_prefers_inode() {
        let mut record = MountRecord {
            pid: 100,
            namespace: Some("mnt:[4026531840]".to_string()),
            mountpoint: PathBuf::from("/x"),
        };
        assert_eq!(record.namespace_key(), NamespaceKey::Inode("mnt:[4026531840]"));
        assert_eq!(record.namespace_key().to_string(), "mnt:[4026531840]");

        record.namespace = None;
        assert_eq!(record.namespace_key(), NamespaceKey::Pid(100));
        assert_eq!(record.namespace_key().to_string(), "pid:100");
    }
}
