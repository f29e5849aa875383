//! Client configuration
//!
//! Defaults, then `config.toml`, then environment variables.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::paths;

/// MCP client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Streamable HTTP endpoint of the DocuNote backend
    pub server_url: String,
    /// Bound on every tool call and health probe
    pub request_timeout: Duration,
    /// Bound on opening a session
    pub connect_timeout: Duration,
    /// Retry budget for callers; the client itself makes one attempt per call
    pub retries: u32,
    /// Health probe period
    pub health_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080/mcp".to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            retries: 3,
            health_interval: Duration::from_secs(30),
        }
    }
}

/// On-disk shape of `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    server_url: Option<String>,
    timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    retries: Option<u32>,
    health_interval_secs: Option<u64>,
}

impl ClientConfig {
    /// Load from the default config path, then apply env overrides
    pub fn load() -> Result<Self> {
        Self::load_from(paths::config_path())?.with_env_overrides()
    }

    /// Load from a TOML file; a missing file yields defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        tracing::info!(server_url = %config.server_url, "loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse TOML content over the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(url) = file.server_url {
            config.server_url = url;
        }
        if let Some(ms) = file.timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = file.retries {
            config.retries = retries;
        }
        if let Some(secs) = file.health_interval_secs {
            config.health_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCUNOTE_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("DOCUNOTE_MCP_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(ms) = env_u64("DOCUNOTE_TIMEOUT_MS")? {
            self.request_timeout = Duration::from_millis(ms);
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("DOCUNOTE_HEALTH_INTERVAL_SECS")? {
            self.health_interval = Duration::from_secs(secs);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            bail!("server_url must be an http(s) URL, got '{}'", self.server_url);
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            bail!("timeouts must be non-zero");
        }
        if self.health_interval.is_zero() {
            bail!("health interval must be non-zero");
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be an integer, got '{}'", name, value)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ENV_LOCK;
    use std::env;
    use std::io::Write;

    fn clear_env() {
        env::remove_var("DOCUNOTE_MCP_SERVER_URL");
        env::remove_var("DOCUNOTE_TIMEOUT_MS");
        env::remove_var("DOCUNOTE_HEALTH_INTERVAL_SECS");
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "http://localhost:8080/mcp");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ClientConfig::from_toml(
            r#"
            server_url = "https://docunote.example/mcp"
            timeout_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.server_url, "https://docunote.example/mcp");
        assert_eq!(config.request_timeout, Duration::from_millis(5000));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.health_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(ClientConfig::from_toml("serverurl = \"http://x\"").is_err());
    }

    #[test]
    fn test_from_toml_rejects_bad_url() {
        assert!(ClientConfig::from_toml("server_url = \"ftp://x\"").is_err());
    }

    #[test]
    fn test_from_toml_rejects_zero_timeout() {
        assert!(ClientConfig::from_toml("timeout_ms = 0").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retries = 5\nhealth_interval_secs = 10").unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.retries, 5);
        assert_eq!(config.health_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DOCUNOTE_MCP_SERVER_URL", "http://10.0.0.5:9000/mcp");
        env::set_var("DOCUNOTE_TIMEOUT_MS", "1500");

        let config = ClientConfig::default().with_env_overrides().unwrap();
        assert_eq!(config.server_url, "http://10.0.0.5:9000/mcp");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
        clear_env();
    }

    #[test]
    fn test_env_override_not_a_number() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DOCUNOTE_HEALTH_INTERVAL_SECS", "soon");
        assert!(ClientConfig::default().with_env_overrides().is_err());
        clear_env();
    }
}
