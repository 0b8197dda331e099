//! Process backend abstraction.
//!
//! The [`CommandRunner`] trait is the single seam through which every
//! external tool is invoked, so tests can script outputs and assert that
//! nothing was spawned.

pub mod process;

use crate::error::Result;
use crate::types::RetryInfo;
use async_trait::async_trait;
use std::time::Duration;

pub use process::ProcessRunner;

/// A command to run: program, arguments, optional stdin and timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            timeout,
        }
    }

    /// Feed `input` to the process on stdin.
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// The command line as it would be typed in a shell.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `-1` when the process was terminated by a signal
    pub exit_code: i32,
    /// Set by the retrying executor
    pub retry_info: Option<RetryInfo>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr, falling back to stdout when stderr is empty.
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs one external command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Spawn, capture stdout/stderr, and kill the process if it outlives
    /// `spec.timeout`.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}
