//! `nsenter` + `umount` based unmounter.

use std::ffi::OsString;
use std::path::PathBuf;

use zumount_common::ProcPaths;

use super::{UnmountOutcome, UnmountTarget, Unmounter, reports_not_mounted};
use crate::command;
use crate::namespace::{NamespaceKinds, NamespacePid};

/// Default `nsenter` binary, resolved through `PATH`.
pub const DEFAULT_NSENTER_BINARY: &str = "nsenter";

/// Default `umount` binary, resolved through `PATH`.
pub const DEFAULT_UMOUNT_BINARY: &str = "umount";

/// Unmounts by running `nsenter --target <pid> ... -- umount --force ...`.
#[derive(Debug, Clone)]
pub struct NsenterUnmounter {
    nsenter: PathBuf,
    umount: PathBuf,
    kinds: NamespaceKinds,
    paths: ProcPaths,
}

impl Default for NsenterUnmounter {
    fn default() -> Self {
        Self {
            nsenter: PathBuf::from(DEFAULT_NSENTER_BINARY),
            umount: PathBuf::from(DEFAULT_UMOUNT_BINARY),
            kinds: NamespaceKinds::default(),
            paths: ProcPaths::default(),
        }
    }
}

impl NsenterUnmounter {
    /// Create an unmounter with the default binaries and namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `nsenter` binary.
    #[must_use]
    pub fn with_nsenter(mut self, binary: impl Into<PathBuf>) -> Self {
        self.nsenter = binary.into();
        self
    }

    /// Set the `umount` binary run inside the namespace.
    #[must_use]
    pub fn with_umount(mut self, binary: impl Into<PathBuf>) -> Self {
        self.umount = binary.into();
        self
    }

    /// Set which namespaces to join.
    #[must_use]
    pub fn with_namespaces(mut self, kinds: NamespaceKinds) -> Self {
        self.kinds = kinds;
        self
    }

    /// Set the procfs paths used to compare user namespaces.
    #[must_use]
    pub fn with_proc_paths(mut self, paths: ProcPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Namespaces to join for `pid`.
    ///
    /// The kernel refuses to re-enter the caller's own user namespace, so the
    /// user namespace is dropped when the target already shares it.
    fn kinds_for(&self, pid: NamespacePid) -> NamespaceKinds {
        let mut kinds = self.kinds;
        if kinds.user && self.shares_user_namespace(pid) {
            kinds.user = false;
        }
        kinds
    }

    fn shares_user_namespace(&self, pid: NamespacePid) -> bool {
        let ours = std::fs::read_link(self.paths.self_user_ns_link());
        let theirs = std::fs::read_link(self.paths.user_ns_link(pid));
        matches!((ours, theirs), (Ok(ours), Ok(theirs)) if ours == theirs)
    }

    /// Full `nsenter` argument list.
    #[must_use]
    pub fn args(
        &self,
        pid: NamespacePid,
        kinds: NamespaceKinds,
        target: UnmountTarget<'_>,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--target".into(), pid.to_string().into()];
        args.extend(kinds.to_nsenter_flags().into_iter().map(OsString::from));
        args.push("--".into());
        args.push(self.umount.clone().into());
        args.push("--force".into());
        match target {
            UnmountTarget::AllTargets(dataset) => {
                args.push("--all-targets".into());
                args.push(dataset.as_str().into());
            }
            UnmountTarget::Mountpoint(path) => args.push(path.into()),
        }
        args
    }
}

impl Unmounter for NsenterUnmounter {
    fn unmount(&self, pid: NamespacePid, target: UnmountTarget<'_>) -> UnmountOutcome {
        let args = self.args(pid, self.kinds_for(pid), target);

        let out = match command::run(&self.nsenter, &args) {
            Ok(out) => out,
            Err(e) => {
                return UnmountOutcome::Failed {
                    message: format!("failed to execute {}: {e}", self.nsenter.display()),
                };
            }
        };

        let diagnostic = out.combined();
        if out.success() {
            tracing::debug!(pid, %target, "Unmounted");
            return UnmountOutcome::Unmounted;
        }
        if reports_not_mounted(&diagnostic) {
            tracing::debug!(pid, %target, output = %diagnostic, "Already unmounted");
            return UnmountOutcome::NotMounted;
        }

        UnmountOutcome::Failed {
            message: format!("{diagnostic} (exit code {})", out.status),
        }
    }
}
