//! Execution wrapper for the host tools zumount drives (`zfs`, `nsenter`,
//! `umount`).
//!
//! Shell integration stays here so the rest of the crate only deals with
//! parsed output and can be tested with fake binaries.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code, `-1` when killed by a signal.
    pub status: i32,
}

impl CommandOutput {
    /// Whether the tool exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout and stderr joined, trimmed, for log lines and error messages.
    #[must_use]
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Run `program` with `args` to completion and capture its output.
///
/// Blocks until the tool exits; there is no timeout.
///
/// # Errors
///
/// Returns an error if the program cannot be spawned.
pub fn run<I, S>(program: &Path, args: I) -> std::io::Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);

    tracing::debug!(command = ?command, "Running command");

    let output = command.output()?;
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(-1),
    })
}
