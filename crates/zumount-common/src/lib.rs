//! # zumount-common
//!
//! Shared types for zumount.
//!
//! This crate provides:
//! - Validated ZFS dataset names
//! - `/proc` path helpers for mount tables and namespace links
//! - Common error types

#![warn(missing_docs)]

pub mod dataset;
pub mod error;
pub mod paths;

pub use dataset::DatasetName;
pub use error::{ZumountError, ZumountResult};
pub use paths::ProcPaths;
