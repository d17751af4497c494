//! Kahunas page interactions: login and session capture.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use playwright::api::frame::FrameState;
use playwright::api::{BrowserContext, Page};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Credentials, LoginSettings};

const LOGIN_PATH: &str = "/login";

/// localStorage keys that may hold the API bearer token, in priority order.
const TOKEN_KEYS: [&str; 3] = ["token", "access_token", "auth_token"];

/// CSS selectors for page elements.
mod selectors {
    pub const LOGIN_EMAIL: &str = "input[name='email']";
    pub const LOGIN_PASSWORD: &str = "input[name='password']";
    pub const LOGIN_SUBMIT: &str = "button[type='submit']";
    /// Present only once the dashboard has rendered
    pub const DASHBOARD: &str = "a[href*='logout']";
}

/// Session written to the auth file, read back by the `kahunas` CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedSession {
    pub token: Option<String>,
    pub cookie: String,
    pub captured_at: String,
}

impl CapturedSession {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Build a `Cookie` header value from name/value pairs
pub fn cookie_header<'a>(cookies: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    cookies
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// First non-empty token among the localStorage values.
///
/// Values may be stored JSON-encoded (`"\"abc\""`), which is unwrapped.
pub fn pick_token(storage: &Value) -> Option<String> {
    TOKEN_KEYS.iter().find_map(|key| {
        let raw = storage.get(*key)?.as_str()?.trim();
        let token = match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(inner)) => inner,
            _ => raw.to_string(),
        };
        (!token.is_empty()).then_some(token)
    })
}

/// Drives the login form and captures the resulting session.
pub struct KahunasSession {
    context: BrowserContext,
    credentials: Credentials,
    settings: LoginSettings,
}

impl KahunasSession {
    pub fn new(context: BrowserContext, credentials: Credentials, settings: LoginSettings) -> Self {
        Self {
            context,
            credentials,
            settings,
        }
    }

    /// Perform login and return the dashboard page.
    pub async fn login(&self) -> Result<Page> {
        let login_url = self.settings.url(LOGIN_PATH);
        info!("Navigating to {}", login_url);
        let page = self
            .context
            .new_page()
            .await
            .context("Failed to create new page")?;

        page.goto_builder(&login_url)
            .goto()
            .await
            .context("Failed to navigate to login page")?;

        debug!("Waiting for login form");
        page.wait_for_selector_builder(selectors::LOGIN_EMAIL)
            .wait_for_selector()
            .await
            .context("Login form did not appear")?;

        info!("Filling login credentials");
        page.fill_builder(selectors::LOGIN_EMAIL, &self.credentials.email)
            .fill()
            .await
            .context("Failed to fill email")?;

        page.fill_builder(selectors::LOGIN_PASSWORD, &self.credentials.password)
            .fill()
            .await
            .context("Failed to fill password")?;

        debug!("Submitting login form");
        page.click_builder(selectors::LOGIN_SUBMIT)
            .click()
            .await
            .context("Failed to click login button")?;

        debug!("Waiting for dashboard");
        page.wait_for_selector_builder(selectors::DASHBOARD)
            .state(FrameState::Attached)
            .wait_for_selector()
            .await
            .context("Dashboard did not load - credentials may be wrong")?;

        // Let the app finish writing its tokens to localStorage
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Logged in");
        Ok(page)
    }

    /// Collect cookies and the bearer token from the logged-in page.
    pub async fn capture(&self, page: &Page) -> Result<CapturedSession> {
        let cookies = self
            .context
            .cookies(&[self.settings.base_url.clone()])
            .await
            .context("Failed to get cookies")?;
        debug!("Captured {} cookies", cookies.len());

        let js_read_storage = r#"
            (keys) => {
                const out = {};
                for (const key of keys) {
                    const value = window.localStorage.getItem(key);
                    if (value !== null) out[key] = value;
                }
                return out;
            }
        "#;
        let storage: Value = page
            .evaluate(js_read_storage, serde_json::json!(TOKEN_KEYS))
            .await
            .context("Failed to read localStorage")?;

        let token = pick_token(&storage);
        if token.is_none() {
            warn!("No token in localStorage; the session will rely on cookies");
        }

        let cookie = cookie_header(cookies.iter().map(|c| (c.name.as_str(), c.value.as_str())));
        if cookie.is_empty() && token.is_none() {
            return Err(anyhow!("Login produced neither cookies nor a token"));
        }

        Ok(CapturedSession {
            token,
            cookie,
            captured_at: Utc::now().to_rfc3339(),
        })
    }

    /// Log in and persist the session.
    ///
    /// If `dry_run` is true, stops after login without writing anything.
    pub async fn run(&self, output: &Path, dry_run: bool) -> Result<Option<CapturedSession>> {
        let page = self.login().await?;

        if dry_run {
            info!("Dry run mode - stopping after login");
            return Ok(None);
        }

        let session = self.capture(&page).await?;
        session.write(output)?;
        info!("Session saved to {:?}", output);
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_cookie_header() {
        let header = cookie_header([("ci_session", "abc"), ("remember", "1")]);
        assert_eq!(header, "ci_session=abc; remember=1");
        assert_eq!(cookie_header(Vec::<(&str, &str)>::new()), "");
    }

    #[test]
    fn test_pick_token_priority() {
        let storage = json!({"auth_token": "c", "access_token": "b"});
        assert_eq!(pick_token(&storage).as_deref(), Some("b"));
    }

    #[test]
    fn test_pick_token_unwraps_json_string() {
        let storage = json!({"token": "\"abc\""});
        assert_eq!(pick_token(&storage).as_deref(), Some("abc"));
    }

    #[test]
    fn test_pick_token_skips_empty() {
        let storage = json!({"token": "  ", "auth_token": "z"});
        assert_eq!(pick_token(&storage).as_deref(), Some("z"));
        assert!(pick_token(&json!({})).is_none());
    }

    #[test]
    fn test_session_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kahunas").join("auth.json");
        let session = CapturedSession {
            token: Some("t".to_string()),
            cookie: "ci_session=abc".to_string(),
            captured_at: "2025-01-01T00:00:00+00:00".to_string(),
        };

        session.write(&path).unwrap();
        assert_eq!(CapturedSession::read(&path).unwrap(), session);

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["cookie"], "ci_session=abc");
    }
}
