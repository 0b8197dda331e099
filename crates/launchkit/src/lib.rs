//! # launchkit
//!
//! Library for discovering and controlling launchd services and system
//! extensions on macOS.
//!
//! This crate provides functionality for:
//! - Parsing `launchctl` and `systemextensionsctl` output across OS releases
//! - Classifying services by protection level and root requirement
//! - Running lifecycle actions through the right privilege path
//! - Retrying transient failures with exponential backoff
//! - Ranking services against a fuzzy search pattern
//!
//! ## Example
//!
//! ```no_run
//! use launchkit::{Action, ActionOptions, Client, Settings};
//!
//! # async fn run() -> launchkit::Result<()> {
//! let client = Client::new(Settings::default())?;
//! let services = client.discover().await?;
//!
//! for hit in client.search(&services, "docker").iter().take(3) {
//!     println!("{} ({})", hit.item.label, hit.item.status);
//! }
//!
//! if let Some(service) = services.iter().find(|s| s.label == "com.example.agent") {
//!     let options = ActionOptions { dry_run: true, ..Default::default() };
//!     let result = client.perform_action(Action::Reload, service, &options).await;
//!     println!("{}", result.command.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry Logic
//!
//! Transient failures (timeouts, busy resources, launchd unreachable) are
//! retried with exponential backoff. Configure it through
//! [`Settings::retry`] with a [`RetryConfig`].

#![warn(clippy::all)]

pub mod action;
pub mod backend;
pub mod classify;
pub mod context;
pub mod detail;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod parser;
pub mod privilege;
pub mod retry;
pub mod search;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{Action, ActionOptions};
pub use context::{Context, OsVersion, SessionEnvironment, Settings};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ActionResult, Confidence, Domain, FailureKind, Inferred, Protection, RetryConfig, RetryInfo,
    Service, ServiceDetail, ServiceStatus, ServiceType,
};

use backend::{CommandRunner, ProcessRunner};
use exec::Executor;
use std::sync::Arc;

/// High-level client for service operations.
///
/// Owns the execution context and the executor built from it.
pub struct Client {
    ctx: Context,
    exec: Executor,
}

impl Client {
    /// Create a client for the current process, spawning real commands.
    pub fn new(settings: Settings) -> Result<Self> {
        let ctx = Context::detect()?
            .with_settings(settings)
            .with_retry_callback(Arc::new(retry::LogCallback));
        Ok(Self::with_runner(ctx, Arc::new(ProcessRunner::new())))
    }

    /// Create a client with a custom runner (useful for testing).
    pub fn with_runner(ctx: Context, runner: Arc<dyn CommandRunner>) -> Self {
        let exec = ctx.executor(runner);
        Self { ctx, exec }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Whether `launchctl` is on PATH.
    pub fn is_available(&self) -> bool {
        which::which(action::LAUNCHCTL).is_ok()
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Discover every service. Fails only if the primary listing fails.
    pub async fn discover(&self) -> Result<Vec<Service>> {
        discovery::Discovery::new(&self.ctx, &self.exec).discover().await
    }

    /// Fetch detail for one service.
    pub async fn fetch_detail(&self, service: &Service) -> Result<ServiceDetail> {
        detail::fetch_detail(&self.ctx, &self.exec, service).await
    }

    /// Refine a service with fetched detail and reclassify it.
    pub fn refine(&self, service: &Service, detail: &ServiceDetail) -> Service {
        self.ctx.classifier().reclassify(service.refine(detail))
    }

    /// Rank services against `pattern`.
    pub fn search<'a, T: searchkit::Searchable>(
        &self,
        services: &'a [T],
        pattern: &str,
    ) -> Vec<searchkit::Ranked<'a, T>> {
        search::search(services, pattern)
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Perform a lifecycle action, or compose its command in dry-run mode.
    pub async fn perform_action(
        &self,
        action: Action,
        service: &Service,
        options: &ActionOptions,
    ) -> ActionResult {
        action::ActionOrchestrator::new(&self.ctx, &self.exec)
            .perform(action, service, options)
            .await
    }

    /// Perform an action given by name; unknown names are rejected.
    pub async fn perform_named(
        &self,
        name: &str,
        service: &Service,
        options: &ActionOptions,
    ) -> ActionResult {
        action::ActionOrchestrator::new(&self.ctx, &self.exec)
            .perform_named(name, service, options)
            .await
    }
}
