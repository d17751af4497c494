//! Configuration loading: TOML file, then environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "kahunas";

/// Client configuration.
///
/// Loaded from `$XDG_CONFIG_HOME/kahunas/config.toml`; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_auth_file")]
    pub auth_file: PathBuf,

    /// Session token given directly instead of through the auth file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timezone: default_timezone(),
            cache_dir: default_cache_dir(),
            auth_file: default_auth_file(),
            token: None,
        }
    }
}

fn default_base_url() -> String {
    "https://kahunas.io".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(APP_DIR)
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_DIR)
}

fn default_auth_file() -> PathBuf {
    config_dir().join("auth.json")
}

impl Config {
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load from `path` (or the default location) and apply environment overrides.
    ///
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Apply `KAHUNAS_*` overrides through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = set("KAHUNAS_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(timezone) = set("KAHUNAS_TIMEZONE") {
            self.timezone = timezone;
        }
        if let Some(auth_file) = set("KAHUNAS_AUTH_FILE") {
            self.auth_file = PathBuf::from(auth_file);
        }
        if let Some(token) = set("KAHUNAS_TOKEN") {
            self.token = Some(token);
        }
    }

    /// Write the config, refusing to overwrite an existing file
    pub fn write_new(&self, path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        info!(path = %path.display(), "Wrote config");
        Ok(true)
    }

    /// The session to authenticate with: the configured token, else the auth file
    pub fn auth_session(&self) -> Result<AuthSession> {
        if let Some(token) = &self.token {
            return Ok(AuthSession {
                token: Some(token.clone()),
                cookie: String::new(),
                captured_at: None,
            });
        }
        AuthSession::load(&self.auth_file)
    }
}

/// Session captured by `kahunas-login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub cookie: String,

    #[serde(default)]
    pub captured_at: Option<String>,
}

impl AuthSession {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| {
            format!(
                "No session at {}. Run `kahunas-login login` first.",
                path.display()
            )
        })?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session file {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.token.as_deref().map_or(true, str::is_empty) && self.cookie.is_empty()
    }
}
