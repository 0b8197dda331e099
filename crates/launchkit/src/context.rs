//! Execution context shared by every component.
//!
//! Everything that would otherwise be process-global state (identity, the
//! session environment, the retry callback, the cached OS version) lives
//! here and is passed explicitly.

use crate::backend::CommandRunner;
use crate::classify::ServiceClassifier;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::retry::{NoCallback, RetryCallback};
use crate::types::RetryConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// System-wide plist directories searched during discovery.
pub const SYSTEM_PLIST_ROOTS: &[&str] = &[
    "/System/Library/LaunchDaemons",
    "/System/Library/LaunchAgents",
    "/Library/LaunchDaemons",
    "/Library/LaunchAgents",
];

/// Terminal emulators that imply a local, attended session.
const KNOWN_TERMINALS: &[&str] = &[
    "Apple_Terminal",
    "iTerm.app",
    "WezTerm",
    "vscode",
    "Hyper",
    "Alacritty",
    "ghostty",
    "WarpTerminal",
    "kitty",
    "tmux",
];

/// Tunable behaviour, usually loaded from the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub retry: RetryConfig,
    pub command_timeout: Duration,
    /// Labels added to the immutable allowlist
    pub extra_immutable: Vec<String>,
    /// Plist directories searched in addition to the standard ones
    pub extra_plist_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            extra_immutable: Vec::new(),
            extra_plist_dirs: Vec::new(),
        }
    }
}

/// Snapshot of the environment variables that describe the login session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnvironment {
    pub ssh_connection: Option<String>,
    pub ssh_client: Option<String>,
    pub ssh_tty: Option<String>,
    pub term_program: Option<String>,
    /// `__CFBundleIdentifier`, set for processes launched from a GUI app
    pub bundle_identifier: Option<String>,
    /// `SECURITYSESSIONID`, set inside an Aqua login session
    pub security_session_id: Option<String>,
}

impl SessionEnvironment {
    /// Read the current process environment.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            ssh_connection: var("SSH_CONNECTION"),
            ssh_client: var("SSH_CLIENT"),
            ssh_tty: var("SSH_TTY"),
            term_program: var("TERM_PROGRAM"),
            bundle_identifier: var("__CFBundleIdentifier"),
            security_session_id: var("SECURITYSESSIONID"),
        }
    }

    /// Logged in over SSH.
    pub fn is_remote(&self) -> bool {
        self.ssh_connection.is_some() || self.ssh_client.is_some() || self.ssh_tty.is_some()
    }

    /// A local user can answer a graphical authentication dialog.
    pub fn is_interactive(&self) -> bool {
        if self.is_remote() {
            return false;
        }
        let known_terminal = self
            .term_program
            .as_deref()
            .is_some_and(|t| KNOWN_TERMINALS.iter().any(|k| k.eq_ignore_ascii_case(t)));
        known_terminal || self.bundle_identifier.is_some() || self.security_session_id.is_some()
    }
}

/// Parsed `sw_vers -productVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl OsVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.').map(str::parse::<u32>);
        let major = parts.next()?.ok()?;
        let minor = parts.next().and_then(|p| p.ok()).unwrap_or(0);
        let patch = parts.next().and_then(|p| p.ok()).unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    /// `launchctl print` exists from 10.10 on.
    pub fn supports_print(&self) -> bool {
        *self >= Self::new(10, 10, 0)
    }
}

impl std::fmt::Display for OsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Identity, environment and settings for one client.
pub struct Context {
    pub uid: u32,
    /// Effective uid is 0
    pub is_root: bool,
    pub home: PathBuf,
    pub session: SessionEnvironment,
    pub settings: Settings,
    retry_callback: Arc<dyn RetryCallback>,
    os_version: OnceCell<Option<OsVersion>>,
}

impl Context {
    /// Build a context for an explicit identity.
    pub fn new(uid: u32, is_root: bool, home: PathBuf, session: SessionEnvironment) -> Self {
        Self {
            uid,
            is_root,
            home,
            session,
            settings: Settings::default(),
            retry_callback: Arc::new(NoCallback),
            os_version: OnceCell::new(),
        }
    }

    /// Build a context for the current process.
    pub fn detect() -> Result<Self> {
        // SAFETY: getuid/geteuid cannot fail and touch no memory
        let (uid, euid) = unsafe { (libc::getuid(), libc::geteuid()) };
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("could not determine home directory".to_string()))?;
        log::debug!("Context: uid={} euid={} home={}", uid, euid, home.display());
        Ok(Self::new(uid, euid == 0, home, SessionEnvironment::from_env()))
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry_callback(mut self, callback: Arc<dyn RetryCallback>) -> Self {
        self.retry_callback = callback;
        self
    }

    /// Pin the OS version instead of asking `sw_vers`.
    pub fn with_os_version(self, version: Option<OsVersion>) -> Self {
        Self {
            os_version: OnceCell::new_with(Some(version)),
            ..self
        }
    }

    /// The logged-in user's GUI domain target, `gui/<uid>`.
    pub fn gui_domain(&self) -> String {
        format!("gui/{}", self.uid)
    }

    /// Directory holding the user's own agents.
    pub fn user_agents_dir(&self) -> PathBuf {
        self.home.join("Library").join("LaunchAgents")
    }

    /// Every plist directory discovery should index.
    pub fn plist_roots(&self) -> Vec<PathBuf> {
        SYSTEM_PLIST_ROOTS
            .iter()
            .map(PathBuf::from)
            .chain(std::iter::once(self.user_agents_dir()))
            .chain(self.settings.extra_plist_dirs.iter().cloned())
            .collect()
    }

    pub fn classifier(&self) -> ServiceClassifier {
        ServiceClassifier::new(&self.home).with_immutable(self.settings.extra_immutable.clone())
    }

    pub fn executor(&self, runner: Arc<dyn CommandRunner>) -> Executor {
        Executor::new(
            runner,
            self.settings.retry.clone(),
            self.settings.command_timeout,
            self.retry_callback.clone(),
        )
    }

    /// OS product version, fetched once per context.
    pub async fn os_version(&self, exec: &Executor) -> Option<OsVersion> {
        *self
            .os_version
            .get_or_init(|| async {
                let spec = exec.spec("sw_vers", ["-productVersion"]);
                match exec.exec_once(&spec).await {
                    Ok(out) if out.success() => OsVersion::parse(&out.stdout),
                    Ok(out) => {
                        log::debug!("sw_vers exited {}: {}", out.exit_code, out.error_text());
                        None
                    }
                    Err(e) => {
                        log::debug!("sw_vers unavailable: {}", e);
                        None
                    }
                }
            })
            .await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("uid", &self.uid)
            .field("is_root", &self.is_root)
            .field("home", &self.home)
            .field("session", &self.session)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
