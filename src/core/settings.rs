//! CS-005: Settings from a TOML config file plus environment overrides.
//!
//! Loaded once at startup and passed into drivers explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the keypair directory.
pub const KEYS_DIR_ENV: &str = "__AWLESS_KEYS_DIR";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Provider region
    pub region: String,

    /// Where `create keypair` writes private keys
    pub keys_dir: Option<PathBuf>,

    /// Credentials file that `create accesskey` appends to
    pub credentials_path: PathBuf,

    /// Timeout for user-data downloads, in seconds
    pub http_timeout_secs: u64,

    /// Checker polling period, in milliseconds
    pub poll_period_ms: u64,

    /// Skip the confirmation prompt before a live run
    pub auto_confirm: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let home = home_dir();
        Settings {
            region: "us-east-1".to_string(),
            keys_dir: Some(home.join(".cloudscript").join("keys")),
            credentials_path: home.join(".aws").join("credentials"),
            http_timeout_secs: 5,
            poll_period_ms: 5000,
            auto_confirm: false,
        }
    }
}

impl Settings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    /// Apply environment overrides from a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(KEYS_DIR_ENV) {
            self.keys_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        if let Some(region) = lookup("AWS_REGION") {
            if !region.trim().is_empty() {
                self.region = region;
            }
        }
    }
}

/// Home directory, falling back to the current directory.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    home_dir().join(".cloudscript").join("config.toml")
}

/// Parse settings from TOML text. Missing keys take defaults.
pub fn parse_settings(text: &str) -> Result<Settings, String> {
    toml::from_str(text).map_err(|e| format!("invalid config: {}", e))
}

/// Load settings from `path` if it exists, then apply process environment.
pub fn load_settings(path: &Path) -> Result<Settings, String> {
    let mut settings = if path.exists() {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        parse_settings(&text)?
    } else {
        Settings::default()
    };
    settings.apply_env(|k| std::env::var(k).ok());
    Ok(settings)
}
