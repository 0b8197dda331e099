//! Lifecycle actions on services.
//!
//! Validation happens strictly before any command is built: label check,
//! protection gate, then service kind. Every outcome is an
//! [`ActionResult`]; nothing here returns `Err`.

use crate::context::Context;
use crate::error::Error;
use crate::exec::Executor;
use crate::parser::is_safe_label;
use crate::privilege::{PrivilegeEscalator, shell_command};
use crate::types::{ActionResult, Domain, FailureKind, Protection, RetryInfo, Service, ServiceType};
use serde::{Deserialize, Serialize};

/// The service manager binary.
pub const LAUNCHCTL: &str = "launchctl";

/// A lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Enable,
    Disable,
    Unload,
    Reload,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Start,
        Action::Stop,
        Action::Enable,
        Action::Disable,
        Action::Unload,
        Action::Reload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Enable => "enable",
            Action::Disable => "disable",
            Action::Unload => "unload",
            Action::Reload => "reload",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// `launchctl` arguments for this action against `target`.
    pub fn launchctl_args(&self, target: &str) -> Vec<String> {
        let verb: &[&str] = match self {
            Action::Start => &["kickstart", "-k"],
            Action::Stop => &["kill", "SIGTERM"],
            Action::Enable => &["enable"],
            Action::Disable => &["disable"],
            Action::Unload => &["bootout"],
            Action::Reload => &["kickstart", "-kp"],
        };
        verb.iter()
            .map(|s| (*s).to_string())
            .chain(std::iter::once(target.to_string()))
            .collect()
    }

    fn past_tense(&self) -> &'static str {
        match self {
            Action::Start => "Started",
            Action::Stop => "Stopped",
            Action::Enable => "Enabled",
            Action::Disable => "Disabled",
            Action::Unload => "Unloaded",
            Action::Reload => "Reloaded",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// Return the composed command instead of running it
    pub dry_run: bool,
    /// Password for headless sessions
    pub password: Option<String>,
}

/// Ordered `(lowercase substring, failure)` pairs for a failed action's stderr.
pub const FAILURE_PATTERNS: &[(&str, FailureKind)] = &[
    ("system integrity protection", FailureKind::Protected),
    ("sip protected", FailureKind::Protected),
    ("operation not permitted", FailureKind::Permission),
    ("permission denied", FailureKind::Permission),
    ("not privileged", FailureKind::Permission),
    ("must be root", FailureKind::Permission),
    ("requires root", FailureKind::Permission),
    ("timed out", FailureKind::Timeout),
    ("timeout", FailureKind::Timeout),
    ("already loaded", FailureKind::AlreadyInState),
    ("already bootstrapped", FailureKind::AlreadyInState),
    ("already running", FailureKind::AlreadyInState),
    ("service is already", FailureKind::AlreadyInState),
    ("no such process", FailureKind::AlreadyInState),
    ("could not find service", FailureKind::NotFound),
    ("no such file or directory", FailureKind::NotFound),
    ("unknown service", FailureKind::NotFound),
    ("not found", FailureKind::NotFound),
];

/// Classify a failed action from its stderr. Falls back to generic.
pub fn classify_failure(stderr: &str) -> FailureKind {
    let lower = stderr.to_lowercase();
    FAILURE_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map_or(FailureKind::Generic, |(_, kind)| *kind)
}

/// Fixed user-facing message for each failure kind.
pub fn failure_message(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Validation => "Invalid request",
        FailureKind::Protected => "Service is protected by System Integrity Protection",
        FailureKind::Permission => "Permission denied. Administrator privileges are required",
        FailureKind::NotFound => "Service not found",
        FailureKind::AlreadyInState => "Service is already in the requested state",
        FailureKind::Timeout => "The operation timed out",
        FailureKind::NeedsPassword => "Administrator password required",
        FailureKind::AuthCancelled => "Authentication was cancelled",
        FailureKind::AuthFailed => "Authentication failed",
        FailureKind::Generic => "Action failed",
    }
}

/// `system/<label>` or `gui/<uid>/<label>`.
pub fn service_target(ctx: &Context, service: &Service) -> String {
    match service.domain.value {
        Domain::System => format!("system/{}", service.label),
        Domain::User | Domain::Gui => format!("{}/{}", ctx.gui_domain(), service.label),
    }
}

/// Validates and runs lifecycle actions.
pub struct ActionOrchestrator<'a> {
    ctx: &'a Context,
    exec: &'a Executor,
}

impl<'a> ActionOrchestrator<'a> {
    pub fn new(ctx: &'a Context, exec: &'a Executor) -> Self {
        Self { ctx, exec }
    }

    /// Perform an action given by name; unknown names are rejected.
    pub async fn perform_named(
        &self,
        name: &str,
        service: &Service,
        options: &ActionOptions,
    ) -> ActionResult {
        match Action::from_name(name) {
            Some(action) => self.perform(action, service, options).await,
            None => ActionResult::failed(FailureKind::Validation, format!("Unknown action: {name}")),
        }
    }

    pub async fn perform(
        &self,
        action: Action,
        service: &Service,
        options: &ActionOptions,
    ) -> ActionResult {
        if let Some(rejected) = self.validate(service) {
            return rejected;
        }

        let target = service_target(self.ctx, service);
        let args = action.launchctl_args(&target);
        let elevate = service.requires_root && !self.ctx.is_root;

        if options.dry_run {
            let command = shell_command(LAUNCHCTL, &args);
            let command = if elevate {
                format!("sudo {command}")
            } else {
                command
            };
            return ActionResult {
                command: Some(command),
                requires_root: Some(service.requires_root),
                ..ActionResult::ok(format!("Would {} {}", action, service.label))
            };
        }

        log::info!("{} {} ({})", action, service.label, target);
        if elevate {
            self.run_elevated(action, service, &args, options.password.as_deref())
                .await
        } else {
            self.run_direct(action, service, &args).await
        }
    }

    fn validate(&self, service: &Service) -> Option<ActionResult> {
        if !is_safe_label(&service.label) {
            let err = Error::InvalidLabel(service.label.clone());
            return Some(
                ActionResult::failed(FailureKind::Validation, "Invalid service label")
                    .with_error(err.to_string()),
            );
        }

        if service.protection.blocks_actions() {
            let message = match service.protection {
                Protection::Immutable => "Core system service cannot be modified",
                _ => failure_message(FailureKind::Protected),
            };
            log::debug!("Refusing action on protected service {}", service.label);
            return Some(ActionResult {
                sip_protected: Some(true),
                ..ActionResult::failed(FailureKind::Protected, message)
            });
        }

        if service.kind.value == ServiceType::Extension {
            return Some(ActionResult::failed(
                FailureKind::Validation,
                "System extensions are managed by their host application",
            ));
        }

        None
    }

    async fn run_direct(&self, action: Action, service: &Service, args: &[String]) -> ActionResult {
        let spec = self.exec.spec(LAUNCHCTL, args.iter().cloned());
        match self.exec.exec_with_retry(&spec).await {
            Ok(output) if output.success() => {
                ActionResult::ok(success_message(action, service)).with_retry_info(output.retry_info)
            }
            Ok(output) => failure_result(service, output.error_text()).with_retry_info(output.retry_info),
            Err(e) => error_result(service, &e),
        }
    }

    async fn run_elevated(
        &self,
        action: Action,
        service: &Service,
        args: &[String],
        password: Option<&str>,
    ) -> ActionResult {
        let escalator = PrivilegeEscalator::new(self.ctx, self.exec);
        let result = match escalator.run(LAUNCHCTL, args, password).await {
            Ok(result) => result,
            Err(e) => return error_result(service, &e),
        };

        let outcome = if result.needs_password {
            ActionResult::failed(
                FailureKind::NeedsPassword,
                failure_message(FailureKind::NeedsPassword),
            )
        } else if result.auth_cancelled {
            ActionResult::failed(
                FailureKind::AuthCancelled,
                failure_message(FailureKind::AuthCancelled),
            )
        } else if result.auth_failed {
            ActionResult::failed(
                FailureKind::AuthFailed,
                failure_message(FailureKind::AuthFailed),
            )
            .with_error(result.stderr.trim())
        } else if result.success {
            ActionResult::ok(success_message(action, service))
        } else {
            let text = if result.stderr.trim().is_empty() {
                result.stdout.trim()
            } else {
                result.stderr.trim()
            };
            failure_result(service, text)
        };
        outcome
            .with_requires_root(true)
            .with_retry_info(result.retry_info)
    }
}

fn success_message(action: Action, service: &Service) -> String {
    format!("{} {}", action.past_tense(), service.display_name)
}

fn failure_result(service: &Service, stderr: &str) -> ActionResult {
    let kind = classify_failure(stderr);
    let mut result = ActionResult::failed(kind, failure_message(kind));
    if !stderr.is_empty() {
        result = result.with_error(stderr);
    }
    match kind {
        FailureKind::Permission => result.with_requires_root(service.requires_root),
        FailureKind::Protected => ActionResult {
            sip_protected: Some(true),
            ..result
        },
        _ => result,
    }
}

fn error_result(service: &Service, err: &Error) -> ActionResult {
    log::warn!("Action on {} failed: {}", service.label, err);
    let kind = match err {
        Error::Timeout { .. } | Error::RetriesExhausted { .. } => FailureKind::Timeout,
        _ => FailureKind::Generic,
    };
    let retry_info = err.retry_errors().map(|(attempts, errors)| RetryInfo {
        attempts,
        retried: attempts > 1,
        retry_errors: errors.to_vec(),
    });
    ActionResult::failed(kind, failure_message(kind))
        .with_error(err.to_string())
        .with_retry_info(retry_info)
}
