//! Real process backend using `tokio::process`.

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Backend that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        log::debug!("Running: {}", spec.display());

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::CommandNotFound(spec.program.clone())
                } else {
                    Error::Spawn {
                        command: spec.display(),
                        source: e,
                    }
                }
            })?;

        if let (Some(input), Some(mut stdin)) = (spec.stdin.as_deref(), child.stdin.take()) {
            // The child may exit before reading; a broken pipe is not our failure
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                log::debug!("Failed writing stdin to {}: {}", spec.program, e);
            }
            drop(stdin);
        }

        // Dropping the child on timeout kills it (kill_on_drop)
        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                log::warn!(
                    "{} exceeded {}s, killed",
                    spec.display(),
                    spec.timeout.as_secs()
                );
                return Err(Error::Timeout {
                    command: spec.display(),
                    timeout: spec.timeout,
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        log::debug!("{} exited with {}", spec.program, exit_code);

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
            retry_info: None,
        })
    }
}
