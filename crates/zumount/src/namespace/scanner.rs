//! Mount table scanning.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use zumount_common::{DatasetName, ProcPaths, ZumountError, ZumountResult};

use super::MountRecord;

/// Finds every place a dataset is currently mounted, across all namespaces.
pub trait MountScanner {
    /// Scan for mounts whose source is exactly `dataset`.
    ///
    /// An empty result means the dataset is not mounted anywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if no mount tables can be found at all.
    fn scan(&self, dataset: &DatasetName) -> ZumountResult<Vec<MountRecord>>;
}

impl<T: MountScanner + ?Sized> MountScanner for &T {
    fn scan(&self, dataset: &DatasetName) -> ZumountResult<Vec<MountRecord>> {
        (**self).scan(dataset)
    }
}

/// One parsed line of a `/proc/<pid>/mounts` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount source; the dataset name for ZFS mounts.
    pub source: String,
    /// Mount point.
    pub mountpoint: PathBuf,
    /// Filesystem type.
    pub fstype: String,
}

/// Parse one mount table line (`source mountpoint fstype options dump pass`).
///
/// Octal escapes the kernel uses for whitespace and backslashes are decoded.
/// Returns `None` for blank or truncated lines.
#[must_use]
pub fn parse_mount_line(line: &str) -> Option<MountEntry> {
    let mut fields = line.split_whitespace();
    let source = fields.next()?;
    let mountpoint = fields.next()?;
    let fstype = fields.next()?;

    Some(MountEntry {
        source: unescape(source).into_owned(),
        mountpoint: PathBuf::from(unescape(mountpoint).into_owned()),
        fstype: fstype.to_string(),
    })
}

/// Decode `\NNN` octal escapes.
fn unescape(field: &str) -> Cow<'_, str> {
    if !field.contains('\\') {
        return Cow::Borrowed(field);
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(decoded) = bytes.get(i + 1..i + 4).and_then(octal_byte) {
                out.push(decoded);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    digits.iter().try_fold(0u16, |acc, &d| {
        (b'0'..=b'7')
            .contains(&d)
            .then(|| acc * 8 + u16::from(d - b'0'))
    })
    .and_then(|value| u8::try_from(value).ok())
}

/// Scans the mount table of every live process under a procfs root.
#[derive(Debug, Clone, Default)]
pub struct ProcMountScanner {
    paths: ProcPaths,
}

impl ProcMountScanner {
    /// Create a scanner over the given procfs paths.
    #[must_use]
    pub const fn new(paths: ProcPaths) -> Self {
        Self { paths }
    }

    fn mount_namespace(&self, pid: u32) -> Option<String> {
        std::fs::read_link(self.paths.mount_ns_link(pid))
            .ok()
            .map(|link| link.to_string_lossy().into_owned())
    }

    fn scan_table(
        &self,
        table: &Path,
        pid: u32,
        dataset: &DatasetName,
        records: &mut Vec<MountRecord>,
    ) {
        let contents = match std::fs::read_to_string(table) {
            Ok(contents) => contents,
            Err(e) => {
                // The process can exit between listing and reading.
                tracing::debug!(
                    table = %table.display(),
                    error = %e,
                    "Ignoring unreadable mount table"
                );
                return;
            }
        };

        let mut namespace = None;
        for entry in contents.lines().filter_map(parse_mount_line) {
            if entry.source != dataset.as_str() {
                continue;
            }
            tracing::debug!(
                pid,
                mountpoint = %entry.mountpoint.display(),
                fstype = %entry.fstype,
                "Found mount"
            );
            let namespace = namespace.get_or_insert_with(|| self.mount_namespace(pid));
            records.push(MountRecord {
                pid,
                namespace: namespace.clone(),
                mountpoint: entry.mountpoint,
            });
        }
    }
}

impl MountScanner for ProcMountScanner {
    fn scan(&self, dataset: &DatasetName) -> ZumountResult<Vec<MountRecord>> {
        let pattern = self.paths.mount_tables_pattern();
        let tables = glob::glob(&pattern).map_err(|e| ZumountError::Config {
            message: format!("invalid mount table pattern {pattern}: {e}"),
        })?;

        let mut table_count = 0usize;
        let mut records = Vec::new();

        for table in tables {
            let table = match table {
                Ok(table) => table,
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring unreadable /proc entry");
                    continue;
                }
            };
            let Some(pid) = ProcPaths::pid_of_mount_table(&table) else {
                continue;
            };
            table_count += 1;
            self.scan_table(&table, pid, dataset, &mut records);
        }

        if table_count == 0 {
            return Err(ZumountError::NoMountTables { pattern });
        }

        tracing::debug!(
            %dataset,
            tables = table_count,
            mounts = records.len(),
            "Scanned mount tables"
        );

        Ok(records)
    }
}
