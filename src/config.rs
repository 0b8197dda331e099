use crate::paths;
use anyhow::{Context, Result, bail};
use launchkit::{RetryConfig, Settings};
use serde::{Deserialize, Serialize};
use snapshot::AdaptiveInterval;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The lanyard configuration file (`config.toml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LanyardConfig {
    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub commands: CommandsSection,

    #[serde(default)]
    pub offline: OfflineSection,

    #[serde(default)]
    pub refresh: RefreshSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub classifier: ClassifierSection,

    #[serde(default)]
    pub discovery: DiscoverySection,
}

impl LanyardConfig {
    /// Load from the resolved config path. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format in lanyard config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.backoff_factor < 1.0 {
            bail!("retry.backoff_factor must be at least 1.0");
        }
        if self.commands.timeout_secs == 0 {
            bail!("commands.timeout_secs must be greater than zero");
        }
        if self.offline.failure_threshold == 0 {
            bail!("offline.failure_threshold must be greater than zero");
        }
        if self.cache.capacity == 0 {
            bail!("cache.capacity must be greater than zero");
        }
        Ok(())
    }

    /// Library settings derived from this config.
    pub fn settings(&self) -> Settings {
        Settings {
            retry: RetryConfig {
                max_retries: self.retry.max_retries,
                base_delay: Duration::from_millis(self.retry.initial_delay_ms),
                backoff_factor: self.retry.backoff_factor,
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
            },
            command_timeout: Duration::from_secs(self.commands.timeout_secs),
            extra_immutable: self.classifier.extra_immutable.clone(),
            extra_plist_dirs: paths::expand_all(&self.discovery.extra_plist_dirs),
        }
    }

    pub fn refresh_interval(&self) -> AdaptiveInterval {
        AdaptiveInterval {
            active: Duration::from_secs(self.refresh.active_interval_secs),
            idle: Duration::from_secs(self.refresh.idle_interval_secs),
            idle_after: Duration::from_secs(self.refresh.idle_after_secs),
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.offline.reconnect_interval_secs)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsSection {
    /// Per-invocation timeout
    pub timeout_secs: u64,
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineSection {
    /// Consecutive discovery failures before going offline
    pub failure_threshold: u32,
    pub reconnect_interval_secs: u64,
}

impl Default for OfflineSection {
    fn default() -> Self {
        Self {
            failure_threshold: snapshot::DEFAULT_FAILURE_THRESHOLD,
            reconnect_interval_secs: snapshot::DEFAULT_RECONNECT_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSection {
    pub enabled: bool,
    pub active_interval_secs: u64,
    pub idle_interval_secs: u64,
    pub idle_after_secs: u64,
}

impl Default for RefreshSection {
    fn default() -> Self {
        let interval = AdaptiveInterval::default();
        Self {
            enabled: true,
            active_interval_secs: interval.active.as_secs(),
            idle_interval_secs: interval.idle.as_secs(),
            idle_after_secs: interval.idle_after.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Detail entries kept before the least recently inserted is evicted
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: snapshot::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierSection {
    /// Labels added to the immutable allowlist (`prefix*` allowed)
    pub extra_immutable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DiscoverySection {
    /// Additional plist directories (`~` and `$VAR` expanded)
    pub extra_plist_dirs: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================
