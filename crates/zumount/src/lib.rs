//! # zumount
//!
//! Unmounts every filesystem and snapshot of a ZFS pool from every mount
//! namespace on the host, so the pool can be destroyed or exported.
//!
//! ## Components
//!
//! - **Dataset enumeration** ([`dataset`]): lists a pool's datasets leaf-first
//! - **Namespace scanning** ([`namespace`]): finds where a dataset is mounted
//!   by reading every process's mount table
//! - **Unmount execution** ([`unmount`]): enters a namespace and force-unmounts
//! - **Convergence** ([`converge`]): repeats scan and unmount per dataset until
//!   nothing is left or no progress is made
//!
//! ## Usage
//!
//! ```no_run
//! use zumount::{CleanConfig, Cleaner};
//!
//! # fn example() -> zumount_common::ZumountResult<()> {
//! let cleaner = Cleaner::from_config(&CleanConfig::default());
//! let report = cleaner.clean("tank")?;
//! println!("cleared {} dataset(s)", report.datasets.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod command;
pub mod config;
pub mod converge;
pub mod dataset;
pub mod namespace;
pub mod unmount;

pub use config::CleanConfig;
pub use converge::{CleanReport, Cleaner, DatasetReport};
