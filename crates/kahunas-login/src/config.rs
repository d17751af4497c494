//! Configuration loading from environment variables.

use anyhow::{Context, Result};
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "https://kahunas.io";

/// Kahunas credentials loaded from environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Load credentials from environment variables.
    ///
    /// Expects `KAHUNAS_EMAIL` and `KAHUNAS_PASSWORD` to be set,
    /// either in the environment or in a `.env` file.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let email = lookup("KAHUNAS_EMAIL").context("KAHUNAS_EMAIL environment variable not set")?;
        let password =
            lookup("KAHUNAS_PASSWORD").context("KAHUNAS_PASSWORD environment variable not set")?;
        Ok(Self { email, password })
    }
}

/// Where to log in and where the captured session goes
#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub base_url: String,
    pub auth_file: PathBuf,
}

impl LoginSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("KAHUNAS_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let auth_file = lookup("KAHUNAS_AUTH_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_auth_file);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_file,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Same location the `kahunas` CLI reads the session from
pub fn default_auth_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("kahunas")
        .join("auth.json")
}
