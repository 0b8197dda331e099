//! Privilege escalation.
//!
//! Chooses exactly one way to run a command as root, in this order:
//! already root, cached sudo credentials, the native authentication
//! dialog (attended local sessions), or a caller-supplied password piped
//! to `sudo -S` (headless sessions). Authentication itself is always left
//! to the OS.

use crate::backend::CommandSpec;
use crate::context::Context;
use crate::error::Result;
use crate::exec::Executor;
use serde::Serialize;

/// Which mechanism ran the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscalationPath {
    /// Process is already root
    Direct,
    /// `sudo -n` with cached credentials
    CachedCredentials,
    /// `osascript ... with administrator privileges`
    NativeDialog,
    /// `sudo -S` fed from stdin
    PasswordStdin,
    /// Nothing ran; a password is needed
    NotAttempted,
}

/// How an authentication attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Cancelled,
    Failed,
}

/// Ordered `(lowercase substring, outcome)` pairs for dialog and sudo stderr.
pub const AUTH_PATTERNS: &[(&str, AuthOutcome)] = &[
    ("user canceled", AuthOutcome::Cancelled),
    ("user cancelled", AuthOutcome::Cancelled),
    ("(-128)", AuthOutcome::Cancelled),
    ("(-60005)", AuthOutcome::Failed),
    ("(-60007)", AuthOutcome::Failed),
    ("incorrect password", AuthOutcome::Failed),
    ("sorry, try again", AuthOutcome::Failed),
    ("authentication failure", AuthOutcome::Failed),
    ("not authorized", AuthOutcome::Failed),
];

/// Classify stderr from an authentication mechanism.
pub fn classify_auth(stderr: &str) -> Option<AuthOutcome> {
    let lower = stderr.to_lowercase();
    AUTH_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, outcome)| *outcome)
}

/// Uniform result of every escalation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub auth_cancelled: bool,
    pub auth_failed: bool,
    pub needs_password: bool,
    pub path: EscalationPath,
    pub retry_info: Option<crate::types::RetryInfo>,
}

impl EscalationResult {
    fn needs_password() -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: -1,
            auth_cancelled: false,
            auth_failed: false,
            needs_password: true,
            path: EscalationPath::NotAttempted,
            retry_info: None,
        }
    }

    fn from_output(
        output: crate::backend::CommandOutput,
        path: EscalationPath,
        classify: bool,
    ) -> Self {
        let success = output.success();
        let outcome = if classify && !success {
            classify_auth(&output.stderr)
        } else {
            None
        };
        Self {
            success,
            auth_cancelled: outcome == Some(AuthOutcome::Cancelled),
            auth_failed: outcome == Some(AuthOutcome::Failed),
            needs_password: false,
            path,
            exit_code: output.exit_code,
            retry_info: output.retry_info,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs commands as root through the appropriate mechanism.
pub struct PrivilegeEscalator<'a> {
    ctx: &'a Context,
    exec: &'a Executor,
}

impl<'a> PrivilegeEscalator<'a> {
    pub fn new(ctx: &'a Context, exec: &'a Executor) -> Self {
        Self { ctx, exec }
    }

    /// Run `program args` as root.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        password: Option<&str>,
    ) -> Result<EscalationResult> {
        if self.ctx.is_root {
            log::debug!("Already root, running {} directly", program);
            let output = self
                .exec
                .exec_with_retry(&self.exec.spec(program, args.iter().cloned()))
                .await?;
            return Ok(EscalationResult::from_output(
                output,
                EscalationPath::Direct,
                false,
            ));
        }

        if self.credentials_cached().await {
            log::debug!("sudo credentials cached");
            let sudo_args = ["-n", program]
                .into_iter()
                .map(str::to_string)
                .chain(args.iter().cloned());
            let output = self
                .exec
                .exec_with_retry(&self.exec.spec("sudo", sudo_args))
                .await?;
            return Ok(EscalationResult::from_output(
                output,
                EscalationPath::CachedCredentials,
                false,
            ));
        }

        if self.ctx.session.is_interactive() {
            log::info!("Requesting administrator privileges via dialog");
            let script = format!(
                "do shell script \"{}\" with administrator privileges",
                applescript_escape(&shell_command(program, args))
            );
            let spec = self.exec.spec("osascript", ["-e".to_string(), script]);
            let output = self.exec.exec_once(&spec).await?;
            return Ok(EscalationResult::from_output(
                output,
                EscalationPath::NativeDialog,
                true,
            ));
        }

        let Some(password) = password else {
            log::debug!("Headless session without password; nothing executed");
            return Ok(EscalationResult::needs_password());
        };

        let sudo_args = ["-S", "-p", "", program]
            .into_iter()
            .map(str::to_string)
            .chain(args.iter().cloned());
        let spec = self
            .exec
            .spec("sudo", sudo_args)
            .with_stdin(format!("{password}\n"));
        let output = self.exec.exec_once(&spec).await?;
        Ok(EscalationResult::from_output(
            output,
            EscalationPath::PasswordStdin,
            true,
        ))
    }

    /// Non-interactive `sudo -n true` probe.
    ///
    /// A probe that cannot run at all counts as "not cached".
    async fn credentials_cached(&self) -> bool {
        let spec: CommandSpec = self.exec.spec("sudo", ["-n", "true"]);
        match self.exec.exec_once(&spec).await {
            Ok(output) => output.success(),
            Err(e) => {
                log::warn!("sudo credential probe failed: {}", e);
                false
            }
        }
    }
}

/// Join a command line, single-quoting arguments that need it.
pub fn shell_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-/:=@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', r"\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionEnvironment;
    use crate::testing::{Reply, ScriptedRunner};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn args() -> Vec<String> {
        vec!["kickstart".to_string(), "-k".to_string(), "system/com.example.d".to_string()]
    }

    fn ctx(is_root: bool, session: SessionEnvironment) -> Context {
        Context::new(501, is_root, PathBuf::from("/Users/tester"), session)
    }

    fn interactive() -> SessionEnvironment {
        SessionEnvironment {
            term_program: Some("Apple_Terminal".to_string()),
            ..Default::default()
        }
    }

    fn headless() -> SessionEnvironment {
        SessionEnvironment {
            ssh_tty: Some("/dev/ttys003".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_auth_patterns() {
        for (pattern, outcome) in AUTH_PATTERNS {
            assert_eq!(classify_auth(&format!("x {pattern} y")), Some(*outcome));
        }
        assert_eq!(
            classify_auth("0:58: execution error: User canceled. (-128)"),
            Some(AuthOutcome::Cancelled)
        );
        assert_eq!(
            classify_auth("Sorry, try again.\nsudo: 1 incorrect password attempt"),
            Some(AuthOutcome::Failed)
        );
        assert_eq!(classify_auth("Boot-out failed: 5"), None);
    }

    #[tokio::test]
    async fn test_root_runs_directly() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("launchctl", [Reply::ok("")]);
        let ctx = ctx(true, interactive());
        let exec = ctx.executor(runner.clone());

        let result = PrivilegeEscalator::new(&ctx, &exec)
            .run("launchctl", &args(), None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.path, EscalationPath::Direct);
        assert_eq!(
            runner.command_lines(),
            vec!["launchctl kickstart -k system/com.example.d"]
        );
    }

    #[tokio::test]
    async fn test_cached_credentials_skip_dialog() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("sudo -n true", [Reply::ok("")]);
        runner.on("sudo -n launchctl", [Reply::ok("")]);
        let ctx = ctx(false, interactive());
        let exec = ctx.executor(runner.clone());

        let result = PrivilegeEscalator::new(&ctx, &exec)
            .run("launchctl", &args(), None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.path, EscalationPath::CachedCredentials);
        assert!(runner.calls().iter().all(|c| c.program != "osascript"));
    }

    #[tokio::test]
    async fn test_interactive_uses_dialog() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("sudo -n true", [Reply::fail(1, "sudo: a password is required")]);
        runner.on("osascript", [Reply::ok("")]);
        let ctx = ctx(false, interactive());
        let exec = ctx.executor(runner.clone());

        let result = PrivilegeEscalator::new(&ctx, &exec)
            .run("launchctl", &args(), None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.path, EscalationPath::NativeDialog);

        let calls = runner.calls();
        let dialog = calls.last().unwrap();
        assert_eq!(dialog.program, "osascript");
        assert_eq!(
            dialog.args[1],
            "do shell script \"launchctl kickstart -k system/com.example.d\" with administrator privileges"
        );
    }

    #[tokio::test]
    async fn test_dialog_cancel_and_failure_distinguished() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("sudo -n true", [Reply::fail(1, "")]);
        runner.on(
            "osascript",
            [
                Reply::fail(1, "execution error: User canceled. (-128)"),
                Reply::fail(1, "execution error: The administrator user name or password was incorrect. (-60007)"),
            ],
        );
        let ctx = ctx(false, interactive());
        let exec = ctx.executor(runner.clone());
        let escalator = PrivilegeEscalator::new(&ctx, &exec);

        let cancelled = escalator.run("launchctl", &args(), None).await.unwrap();
        assert!(cancelled.auth_cancelled);
        assert!(!cancelled.auth_failed);

        let failed = escalator.run("launchctl", &args(), None).await.unwrap();
        assert!(failed.auth_failed);
        assert!(!failed.auth_cancelled);
    }

    #[tokio::test]
    async fn test_probe_error_counts_as_not_cached() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("sudo -n true", [Reply::NotFound]);
        runner.on("osascript", [Reply::ok("")]);
        let ctx = ctx(false, interactive());
        let exec = ctx.executor(runner.clone());

        let result = PrivilegeEscalator::new(&ctx, &exec)
            .run("launchctl", &args(), None)
            .await
            .unwrap();
        assert_eq!(result.path, EscalationPath::NativeDialog);
    }

    #[tokio::test]
    async fn test_headless_without_password_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("sudo -n true", [Reply::fail(1, "sudo: a password is required")]);
        let ctx = ctx(false, headless());
        let exec = ctx.executor(runner.clone());

        let result = PrivilegeEscalator::new(&ctx, &exec)
            .run("launchctl", &args(), None)
            .await
            .unwrap();
        assert!(result.needs_password);
        assert!(!result.success);
        assert_eq!(result.path, EscalationPath::NotAttempted);
        // Only the probe ran
        assert_eq!(runner.command_lines(), vec!["sudo -n true"]);
    }

    #[tokio::test]
    async fn test_headless_password_piped() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("sudo -n true", [Reply::fail(1, "")]);
        runner.on(
            "sudo -S",
            [
                Reply::fail(1, "Sorry, try again.\nsudo: 1 incorrect password attempt"),
                Reply::ok(""),
            ],
        );
        let ctx = ctx(false, headless());
        let exec = ctx.executor(runner.clone());
        let escalator = PrivilegeEscalator::new(&ctx, &exec);

        let wrong = escalator.run("launchctl", &args(), Some("nope")).await.unwrap();
        assert!(wrong.auth_failed);
        assert_eq!(wrong.path, EscalationPath::PasswordStdin);

        let right = escalator.run("launchctl", &args(), Some("hunter2")).await.unwrap();
        assert!(right.success);

        let piped = runner.calls().into_iter().filter(|c| c.program == "sudo" && c.args[0] == "-S").collect::<Vec<_>>();
        assert_eq!(piped.len(), 2);
        assert_eq!(piped[1].stdin.as_deref(), Some("hunter2\n"));
        assert_eq!(&piped[1].args[..4], &["-S", "-p", "", "launchctl"]);
    }

    #[test]
    fn test_shell_quoting() {
        assert_eq!(
            shell_command("launchctl", &["kill".to_string(), "SIGTERM".to_string()]),
            "launchctl kill SIGTERM"
        );
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(applescript_escape(r#"say "hi" \"#), r#"say \"hi\" \\"#);
    }
}
