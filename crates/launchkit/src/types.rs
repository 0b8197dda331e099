//! Core types for launchd service management.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Kind of managed background service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// System-wide daemon (LaunchDaemons)
    Daemon,
    /// Per-user agent (LaunchAgents)
    Agent,
    /// System extension (network, endpoint security, driver)
    Extension,
}

impl ServiceType {
    /// Lowercase name used in CLI filters and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Daemon => "daemon",
            ServiceType::Agent => "agent",
            ServiceType::Extension => "extension",
        }
    }

    /// Parse from a filter name (case-insensitive).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daemon" | "launchdaemon" => Some(ServiceType::Daemon),
            "agent" | "launchagent" => Some(ServiceType::Agent),
            "extension" | "systemextension" => Some(ServiceType::Extension),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scope a service lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Machine-wide
    System,
    /// Per-user background
    User,
    /// Per-user graphical session
    Gui,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::System => "system",
            Domain::User => "user",
            Domain::Gui => "gui",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "system" => Some(Domain::System),
            "user" => Some(Domain::User),
            "gui" => Some(Domain::Gui),
            _ => None,
        }
    }

    /// Parse a domain target such as `gui/501` or `system`.
    pub fn from_target(target: &str) -> Option<Self> {
        let head = target.split('/').next().unwrap_or(target);
        Self::from_name(head.trim())
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed run state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Disabled,
    Error,
    Unknown,
}

/// Exit status reported after a SIGTERM, which is what `stop` sends.
const SIGTERM_EXIT: i32 = -15;

impl ServiceStatus {
    /// Derive the status from the raw columns of a list row.
    ///
    /// Status is never stored independently of these three inputs.
    pub fn derive(pid: Option<u32>, exit_status: Option<i32>, enabled: bool) -> Self {
        if !enabled {
            return ServiceStatus::Disabled;
        }
        if pid.is_some() {
            return ServiceStatus::Running;
        }
        match exit_status {
            None | Some(0) | Some(SIGTERM_EXIT) => ServiceStatus::Stopped,
            Some(_) => ServiceStatus::Error,
        }
    }

    /// Rank used when the same extension is reported more than once.
    /// Higher is "more active".
    pub fn activity_rank(&self) -> u8 {
        match self {
            ServiceStatus::Running => 4,
            ServiceStatus::Stopped => 3,
            ServiceStatus::Disabled => 2,
            ServiceStatus::Error => 1,
            ServiceStatus::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Disabled => "disabled",
            ServiceStatus::Error => "error",
            ServiceStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Protection level, derived by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protection {
    Normal,
    SipProtected,
    SystemOwned,
    Immutable,
}

impl Protection {
    /// Whether lifecycle actions must be refused outright.
    pub fn blocks_actions(&self) -> bool {
        matches!(self, Protection::SipProtected | Protection::Immutable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protection::Normal => "normal",
            Protection::SipProtected => "sip-protected",
            Protection::SystemOwned => "system-owned",
            Protection::Immutable => "immutable",
        }
    }
}

impl std::fmt::Display for Protection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How sure we are about an inferred value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Guessed from the label at discovery time
    Provisional,
    /// Backed by a plist location or detail output
    Confirmed,
}

/// A value tagged with whether it was guessed or confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Inferred<T> {
    pub value: T,
    pub confidence: Confidence,
}

impl<T> Inferred<T> {
    pub fn provisional(value: T) -> Self {
        Self {
            value,
            confidence: Confidence::Provisional,
        }
    }

    pub fn confirmed(value: T) -> Self {
        Self {
            value,
            confidence: Confidence::Confirmed,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confidence == Confidence::Confirmed
    }

    /// Replace a provisional value with a confirmed one; confirmed values stay.
    pub fn refine(self, other: Option<Inferred<T>>) -> Self {
        match other {
            Some(o) if o.is_confirmed() || !self.is_confirmed() => o,
            _ => self,
        }
    }
}

/// A discovered service. Immutable within a snapshot; replaced, not mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// `<domain>/<label>`, unique within a snapshot
    pub id: String,
    pub label: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: Inferred<ServiceType>,
    pub domain: Inferred<Domain>,
    pub status: ServiceStatus,
    pub protection: Protection,
    pub pid: Option<u32>,
    pub exit_status: Option<i32>,
    pub enabled: bool,
    pub is_vendor_owned: bool,
    pub requires_root: bool,
    pub file_path: Option<PathBuf>,
    pub description: Option<String>,
    pub last_error: Option<String>,
    pub team_id: Option<String>,
    pub version: Option<String>,
    pub extension_state: Option<String>,
    pub categories: Option<Vec<String>>,
}

impl Service {
    /// Build the snapshot id for a label in a domain.
    pub fn make_id(domain: Domain, label: &str) -> String {
        format!("{}/{}", domain.as_str(), label)
    }

    /// Whether any volatile field differs from `other`.
    pub fn volatile_differs(&self, other: &Service) -> bool {
        self.status != other.status
            || self.pid != other.pid
            || self.enabled != other.enabled
            || self.exit_status != other.exit_status
            || self.last_error != other.last_error
    }

    /// Return a copy with fields refined from fetched detail.
    ///
    /// The id follows the refined domain. Classifier-derived fields
    /// (`requires_root`, `protection`) are recomputed by
    /// [`ServiceClassifier::reclassify`](crate::classify::ServiceClassifier::reclassify).
    pub fn refine(&self, detail: &ServiceDetail) -> Service {
        let mut refined = self.clone();
        refined.kind = self.kind.refine(detail.kind);
        refined.domain = self.domain.refine(detail.domain);
        refined.id = Service::make_id(refined.domain.value, &refined.label);
        if refined.file_path.is_none() {
            refined.file_path = detail.file_path.clone();
        }
        if detail.description.is_some() {
            refined.description = detail.description.clone();
        }
        refined
    }
}

/// One row of list output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub pid: Option<u32>,
    pub exit_status: Option<i32>,
    pub label: String,
}

/// One (deduplicated) entry of the extension listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    pub bundle_id: String,
    pub team_id: Option<String>,
    pub version: Option<String>,
    pub name: Option<String>,
    pub enabled: bool,
    pub active: bool,
    pub state: Option<String>,
    pub status: ServiceStatus,
    pub categories: Vec<String>,
}

/// Lazily fetched per-service detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetail {
    pub pid: Option<u32>,
    pub exit_status: Option<i32>,
    pub state: Option<String>,
    pub file_path: Option<PathBuf>,
    pub program: Option<String>,
    pub arguments: Vec<String>,
    pub description: Option<String>,
    pub run_at_load: Option<bool>,
    pub keep_alive: Option<bool>,
    pub kind: Option<Inferred<ServiceType>>,
    pub domain: Option<Inferred<Domain>>,
    /// Every normalized key from the print output
    pub properties: BTreeMap<String, String>,
}

/// Retry bookkeeping attached to executed commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryInfo {
    /// Total attempts made (always >= 1)
    pub attempts: u32,
    pub retried: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub retry_errors: Vec<String>,
}

impl RetryInfo {
    pub fn single() -> Self {
        Self {
            attempts: 1,
            retried: false,
            retry_errors: Vec::new(),
        }
    }
}

/// Why an action did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Label failed validation or action unsupported
    Validation,
    /// Service is SIP-protected or immutable
    Protected,
    /// Elevation needed
    Permission,
    NotFound,
    AlreadyInState,
    Timeout,
    NeedsPassword,
    AuthCancelled,
    AuthFailed,
    Generic,
}

/// Outcome of a lifecycle action. Expected failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_root: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sip_protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_info: Option<RetryInfo>,
    /// Composed command, dry-run only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            failure: None,
            requires_root: None,
            sip_protected: None,
            retry_info: None,
            command: None,
        }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            failure: Some(kind),
            ..Self::ok(message)
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_requires_root(mut self, requires_root: bool) -> Self {
        self.requires_root = Some(requires_root);
        self
    }

    pub fn with_retry_info(mut self, info: Option<RetryInfo>) -> Self {
        self.retry_info = info;
        self
    }
}

/// Configuration for retry logic.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}
