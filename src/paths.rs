//! Centralized path resolution for docunote
//!
//! Follows XDG Base Directory Specification with 12-factor env var overrides.
//!
//! ## Directory Layout
//!
//! ```text
//! ~/.config/docunote/          (XDG_CONFIG_HOME)
//! └── config.toml
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DOCUNOTE_CONFIG` | Client config | `~/.config/docunote/config.toml` |

use std::path::PathBuf;

/// Get the XDG config directory for docunote
///
/// Priority: `XDG_CONFIG_HOME` > `~/.config`
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("docunote");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config/docunote");
    }

    // Last resort: current directory
    PathBuf::from(".")
}

/// Get the client config path
///
/// Priority: `DOCUNOTE_CONFIG` env var > `config_dir()/config.toml`
pub fn config_path() -> PathBuf {
    std::env::var("DOCUNOTE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.toml"))
}

/// Log resolved paths for discoverability
pub fn log_paths() {
    use tracing::info;
    info!("📂 config directory: {}", config_dir().display());
    info!("📂 client config: {}", config_path().display());
}

/// Serializes tests that modify env vars.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
