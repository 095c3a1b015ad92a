//! External process execution with captured output.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, ShellError};

/// A command to execute: program, ordered arguments, optional working directory.
///
/// Program and arguments are kept as OS strings so paths reach the child
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs. Lossy for non-UTF-8 arguments.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(OsStr::to_string_lossy)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout, invalid UTF-8 replaced with U+FFFD.
    pub stdout: String,

    /// Captured stderr, invalid UTF-8 replaced with U+FFFD.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ProcessResult {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Seam for executing external tools.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the command to completion. A spawn failure is `ShellError::Launch`;
    /// a non-zero exit is a normal `ProcessResult`.
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessResult>;
}

/// Runs commands as child processes via tokio. No timeout is applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessResult> {
        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|source| ShellError::Launch {
            program: spec.program.to_string_lossy().into_owned(),
            source,
        })?;
        let output = child.wait_with_output().await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            command = %spec.display(),
            exit_code,
            duration_ms,
            "process finished"
        );

        Ok(ProcessResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
        })
    }
}
