//! ZFS dataset name validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ZumountError, ZumountResult};

/// Separator between a dataset and its snapshot name.
pub const SNAPSHOT_MARKER: char = '@';

/// A validated ZFS dataset name.
///
/// Filesystems look like `pool/a/b`, snapshots like `pool/a/b@snap`.
/// Dataset names must:
/// - Be non-empty and not start with `/`
/// - Contain no empty path components
/// - Contain at most one snapshot marker, with a non-empty snapshot name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetName(String);

impl DatasetName {
    /// Create a new dataset name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed.
    pub fn new(name: impl Into<String>) -> ZumountResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Get the dataset name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this names a snapshot.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.0.contains(SNAPSHOT_MARKER)
    }

    /// Whether `self` is a strict descendant of `other`: a child filesystem,
    /// or a snapshot of `other` or of one of its children.
    #[must_use]
    pub fn is_descendant_of(&self, other: &Self) -> bool {
        if self == other || other.is_snapshot() {
            return false;
        }
        let Some(rest) = self.0.strip_prefix(other.as_str()) else {
            return false;
        };
        rest.starts_with('/') || rest.starts_with(SNAPSHOT_MARKER)
    }

    fn validate(name: &str) -> ZumountResult<()> {
        let invalid = || ZumountError::InvalidDataset {
            name: name.to_string(),
        };

        if name.trim().is_empty() || name.starts_with('/') {
            return Err(invalid());
        }

        let (filesystem, snapshot) = match name.split_once(SNAPSHOT_MARKER) {
            Some((fs, snap)) => (fs, Some(snap)),
            None => (name, None),
        };

        if filesystem.split('/').any(str::is_empty) {
            return Err(invalid());
        }

        if let Some(snap) = snapshot {
            if snap.is_empty() || snap.contains(SNAPSHOT_MARKER) || snap.contains('/') {
                return Err(invalid());
            }
        }

        Ok(())
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DatasetName {
    type Err = ZumountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DatasetName {
    type Error = ZumountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatasetName> for String {
    fn from(name: DatasetName) -> Self {
        name.0
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
