//! Path resolution for lanyard
//!
//! # Environment Variables
//!
//! - `LANYARD_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/lanyard`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `LANYARD_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/lanyard` (if set)
//! 3. `~/.config/lanyard`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "LANYARD_CONFIG_DIR";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

const APP_DIR: &str = "lanyard";

/// Get the lanyard config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(
        std::env::var(ENV_CONFIG_DIR).ok(),
        std::env::var("XDG_CONFIG_HOME").ok(),
        dirs::home_dir(),
    )
}

/// Get the config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

fn resolve_config_dir(
    override_dir: Option<String>,
    xdg_config: Option<String>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    // 1. Explicit override
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    // 2. XDG_CONFIG_HOME
    if let Some(xdg) = xdg_config.filter(|d| !d.is_empty()) {
        let path = PathBuf::from(xdg).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // 3. ~/.config/lanyard
    let home = home.context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Expand every path in a list.
pub fn expand_all<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| expand(&p.as_ref().to_string_lossy()))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
