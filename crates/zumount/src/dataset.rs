//! Dataset enumeration.
//!
//! Lists every filesystem and snapshot of a pool through the `zfs` CLI and
//! orders them leaf-first, so children and snapshots are cleared before the
//! datasets they hang off.

use std::cmp::Reverse;
use std::path::PathBuf;

use zumount_common::{DatasetName, ZumountError, ZumountResult};

use crate::command;

/// Lists the datasets belonging to a pool.
pub trait DatasetSource {
    /// List every filesystem and snapshot under `pool`, in any order.
    ///
    /// A pool that does not exist yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails for any other reason.
    fn list(&self, pool: &str) -> ZumountResult<Vec<DatasetName>>;
}

impl<T: DatasetSource + ?Sized> DatasetSource for &T {
    fn list(&self, pool: &str) -> ZumountResult<Vec<DatasetName>> {
        (**self).list(pool)
    }
}

/// List a pool's datasets, deepest first.
///
/// # Errors
///
/// Propagates any listing failure from `source`.
pub fn list_leaf_first<S: DatasetSource + ?Sized>(
    source: &S,
    pool: &str,
) -> ZumountResult<Vec<DatasetName>> {
    let mut datasets = source.list(pool)?;
    sort_leaf_first(&mut datasets);
    Ok(datasets)
}

/// Order datasets so every child and snapshot precedes its parent.
///
/// A child or snapshot name always strictly extends its parent's name, so
/// sorting by descending length is enough; ties are broken lexically to keep
/// the order deterministic.
pub fn sort_leaf_first(datasets: &mut [DatasetName]) {
    datasets.sort_by(|a, b| {
        Reverse(a.as_str().len())
            .cmp(&Reverse(b.as_str().len()))
            .then_with(|| a.cmp(b))
    });
}

/// Default `zfs` binary, resolved through `PATH`.
pub const DEFAULT_ZFS_BINARY: &str = "zfs";

/// [`DatasetSource`] backed by `zfs list`.
#[derive(Debug, Clone)]
pub struct ZfsCli {
    binary: PathBuf,
}

impl Default for ZfsCli {
    fn default() -> Self {
        Self::new(DEFAULT_ZFS_BINARY)
    }
}

impl ZfsCli {
    /// Create a source that runs the given `zfs` binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments for listing every filesystem and snapshot under `pool`.
    #[must_use]
    pub fn list_args(pool: &str) -> [&str; 8] {
        [
            "list", "-H", "-r", "-o", "name", "-t", "filesystem,snapshot", pool,
        ]
    }
}

impl DatasetSource for ZfsCli {
    fn list(&self, pool: &str) -> ZumountResult<Vec<DatasetName>> {
        let out = command::run(&self.binary, Self::list_args(pool)).map_err(|e| {
            ZumountError::PoolListing {
                pool: pool.to_string(),
                message: format!("failed to execute {}: {e}", self.binary.display()),
            }
        })?;

        if !out.success() {
            let diagnostic = out.combined();
            if pool_missing(&diagnostic) {
                tracing::info!(pool, "Pool does not exist, nothing to unmount");
                return Ok(Vec::new());
            }
            return Err(ZumountError::PoolListing {
                pool: pool.to_string(),
                message: format!("{diagnostic} (exit code {})", out.status),
            });
        }

        parse_list_output(&out.stdout)
    }
}

/// Whether `zfs` output says the pool or dataset does not exist.
fn pool_missing(diagnostic: &str) -> bool {
    let lower = diagnostic.to_ascii_lowercase();
    lower.contains("dataset does not exist") || lower.contains("no such pool")
}

/// Parse `zfs list -H -o name` output, one name per line.
///
/// Names may contain spaces, so lines are taken verbatim apart from the
/// line terminator.
///
/// # Errors
///
/// Returns an error if a line is not a valid dataset name.
pub fn parse_list_output(stdout: &str) -> ZumountResult<Vec<DatasetName>> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(DatasetName::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<DatasetName> {
        list.iter().map(|n| DatasetName::new(*n).unwrap()).collect()
    }

    struct Fixed(Vec<DatasetName>);

    impl DatasetSource for Fixed {
        fn list(&self, _pool: &str) -> ZumountResult<Vec<DatasetName>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn leaf_first_for_hierarchy() {
        let source = Fixed(names(&["pool/a", "pool/a/b", "pool/a/b@snap"]));
        let ordered = list_leaf_first(&source, "pool").unwrap();
        assert_eq!(ordered, names(&["pool/a/b@snap", "pool/a/b", "pool/a"]));
    }

    #[test]
    fn leaf_first_is_deterministic_on_ties() {
        let mut datasets = names(&["tank", "tank/b", "tank/a", "tank@s"]);
        sort_leaf_first(&mut datasets);
        assert_eq!(datasets, names(&["tank/a", "tank/b", "tank@s", "tank"]));
    }

    #[test]
    fn parse_list() {
        let parsed = parse_list_output("tank\ntank/x\ntank/x@snap1\n\n").unwrap();
        assert_eq!(parsed, names(&["tank", "tank/x", "tank/x@snap1"]));
    }

    #[test]
    fn parse_list_keeps_spaces_in_names() {
        let parsed = parse_list_output("tank/my data \r\ntank/x\r\n").unwrap();
        assert_eq!(parsed, names(&["tank/my data ", "tank/x"]));
    }

    #[test]
    fn parse_list_rejects_garbage() {
        let err = parse_list_output("tank\n/not/a/dataset\n").unwrap_err();
        assert!(matches!(err, ZumountError::InvalidDataset { .. }));
    }

    #[test]
    fn missing_pool_detection() {
        assert!(pool_missing("cannot open 'ghost': dataset does not exist"));
        assert!(pool_missing("cannot open 'ghost': no such pool"));
        assert!(!pool_missing("permission denied"));
    }

    #[test]
    fn list_command_line() {
        insta::assert_snapshot!(
            ZfsCli::list_args("tank").join(" "),
            @"list -H -r -o name -t filesystem,snapshot tank"
        );
    }

    proptest::proptest! {
        #[test]
        fn children_always_precede_parents(
            paths in proptest::collection::vec(
                proptest::collection::vec("[a-c]{1,2}", 0..4),
                1..12,
            ),
            snaps in proptest::collection::vec(proptest::option::of("[s-u]{1,2}"), 12),
        ) {
            let mut datasets = Vec::new();
            for (components, snap) in paths.iter().zip(&snaps) {
                let mut name = String::from("pool");
                for component in components {
                    name.push('/');
                    name.push_str(component);
                }
                if let Some(snap) = snap {
                    datasets.push(DatasetName::new(format!("{name}@{snap}")).unwrap());
                }
                datasets.push(DatasetName::new(name).unwrap());
            }

            sort_leaf_first(&mut datasets);

            for (i, parent) in datasets.iter().enumerate() {
                for child in &datasets[i + 1..] {
                    proptest::prop_assert!(
                        !child.is_descendant_of(parent),
                        "{} came after its parent {}", child, parent
                    );
                }
            }
        }
    }
}
