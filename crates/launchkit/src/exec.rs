//! Single-attempt and retrying command execution.

use crate::backend::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{Error, Result};
use crate::retry::{self, RetryCallback};
use crate::types::{RetryConfig, RetryInfo};
use std::sync::Arc;
use std::time::Duration;

/// Runs commands through a [`CommandRunner`], optionally with retries.
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    retry: RetryConfig,
    timeout: Duration,
    callback: Arc<dyn RetryCallback>,
}

impl Executor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        retry: RetryConfig,
        timeout: Duration,
        callback: Arc<dyn RetryCallback>,
    ) -> Self {
        Self {
            runner,
            retry,
            timeout,
            callback,
        }
    }

    /// Default per-command timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build a spec with the default timeout.
    pub fn spec<I, S>(&self, program: &str, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(program, args, self.timeout)
    }

    /// Run once. Non-zero exits are returned as output, not errors.
    pub async fn exec_once(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.runner.run(spec).await
    }

    /// Run with bounded exponential backoff on transient failures.
    ///
    /// A non-zero exit whose stderr is not transient returns immediately.
    /// When every attempt fails transiently the result is
    /// [`Error::RetriesExhausted`] carrying the failure log.
    pub async fn exec_with_retry(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let max_attempts = self.retry.max_attempts();
        let mut errors: Vec<String> = Vec::new();

        for attempt in 0..max_attempts {
            let failure = match self.runner.run(spec).await {
                Ok(mut output) => {
                    if output.success()
                        || !retry::is_transient(output.error_text(), output.exit_code)
                    {
                        output.retry_info = Some(RetryInfo {
                            attempts: attempt + 1,
                            retried: attempt > 0,
                            retry_errors: errors,
                        });
                        return Ok(output);
                    }
                    format!("exit {}: {}", output.exit_code, output.error_text())
                }
                Err(e) if e.is_retryable() => e.to_string(),
                Err(e) => return Err(e),
            };

            errors.push(failure);
            if attempt + 1 >= max_attempts {
                break;
            }

            let delay = self.retry.delay_for_attempt(attempt);
            if let Some(last) = errors.last() {
                self.callback
                    .on_retry(attempt + 1, max_attempts, last, delay.as_millis() as u64);
            }
            tokio::time::sleep(delay).await;
        }

        log::warn!("{} failed after {} attempts", spec.display(), max_attempts);
        Err(Error::RetriesExhausted {
            attempts: max_attempts,
            errors,
        })
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::NoCallback;
    use crate::testing::{Reply, ScriptedRunner};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        }
    }

    fn executor(runner: &Arc<ScriptedRunner>) -> Executor {
        Executor::new(
            runner.clone(),
            fast_retry(),
            Duration::from_secs(5),
            Arc::new(NoCallback),
        )
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "launchctl kickstart",
            [
                Reply::fail(5, "Could not contact launchd"),
                Reply::fail(1, "Resource busy"),
                Reply::ok(""),
            ],
        );
        let exec = executor(&runner);
        let spec = exec.spec("launchctl", ["kickstart", "-k", "system/com.x"]);

        let output = exec.exec_with_retry(&spec).await.unwrap();
        assert!(output.success());
        let info = output.retry_info.unwrap();
        assert_eq!(info.attempts, 3);
        assert!(info.retried);
        assert_eq!(info.retry_errors.len(), 2);
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "launchctl",
            [Reply::fail(113, "Could not find service \"x\" in domain")],
        );
        let exec = executor(&runner);
        let output = exec
            .exec_with_retry(&exec.spec("launchctl", ["print", "system/x"]))
            .await
            .unwrap();
        assert_eq!(output.exit_code, 113);
        assert_eq!(output.retry_info.unwrap().attempts, 1);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl", [Reply::fail(1, "Operation timed out")]);
        let calls = Arc::new(AtomicU32::new(0));

        struct Counting(Arc<AtomicU32>);
        impl RetryCallback for Counting {
            fn on_retry(&self, _: u32, _: u32, _: &str, _: u64) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let exec = Executor::new(
            runner.clone(),
            fast_retry(),
            Duration::from_secs(5),
            Arc::new(Counting(calls.clone())),
        );
        let err = exec
            .exec_with_retry(&exec.spec("launchctl", ["list"]))
            .await
            .unwrap_err();
        let (attempts, errors) = err.retry_errors().unwrap();
        assert_eq!(attempts, 4);
        assert_eq!(errors.len(), 4);
        assert_eq!(runner.calls().len(), 4);
        // No callback after the final attempt
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_error_is_retried() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl", [Reply::Timeout, Reply::ok("ok")]);
        let exec = executor(&runner);
        let output = exec
            .exec_with_retry(&exec.spec("launchctl", ["list"]))
            .await
            .unwrap();
        assert_eq!(output.stdout, "ok");
        assert_eq!(output.retry_info.unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_missing_tool_not_retried() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl", [Reply::NotFound]);
        let exec = executor(&runner);
        let err = exec
            .exec_with_retry(&exec.spec("launchctl", ["list"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandNotFound(_)));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_exec_once_returns_non_zero() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl", [Reply::fail(1, "Operation timed out")]);
        let exec = executor(&runner);
        let output = exec
            .exec_once(&exec.spec("launchctl", ["list"]))
            .await
            .unwrap();
        assert_eq!(output.exit_code, 1);
        assert_eq!(runner.calls().len(), 1);
    }
}
