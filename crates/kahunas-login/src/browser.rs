//! Playwright browser setup.

use anyhow::{Context, Result};
use playwright::api::{Browser, BrowserContext, Playwright};
use std::path::{Path, PathBuf};

/// Browser configuration options.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    /// Whether to show the browser window (false = headless).
    pub headed: bool,
}

/// Wrapper around a launched Chromium instance.
pub struct BrowserSession {
    // Dropping the driver would kill the browser
    _playwright: Playwright,
    browser: Browser,
}

/// Playwright browser cache directories, macOS first.
fn playwright_cache_dirs() -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::env::var_os("PLAYWRIGHT_BROWSERS_PATH")
        .map(PathBuf::from)
        .into_iter()
        .collect();
    if let Some(home) = dirs::home_dir() {
        found.push(home.join("Library/Caches/ms-playwright"));
        found.push(home.join(".cache/ms-playwright"));
    }
    found
}

/// Newest full Chromium build inside a Playwright cache directory.
fn find_chromium_in_cache(cache_dir: &Path) -> Option<PathBuf> {
    let mut builds: Vec<PathBuf> = std::fs::read_dir(cache_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("chromium-") && !n.contains("headless_shell"))
        })
        .collect();
    builds.sort();

    const EXECUTABLES: [&str; 4] = [
        "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
        "chrome-mac/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
        "chrome-linux64/chrome",
        "chrome-linux/chrome",
    ];

    let build = builds.last()?;
    EXECUTABLES
        .iter()
        .map(|candidate| build.join(candidate))
        .find(|path| path.exists())
}

fn find_chromium_executable() -> Option<PathBuf> {
    playwright_cache_dirs()
        .iter()
        .find_map(|dir| find_chromium_in_cache(dir))
}

impl BrowserSession {
    /// Launch Chromium with the given options.
    pub async fn launch(options: BrowserOptions) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let chromium_path = find_chromium_executable().context(
            "Chromium not found. Run 'npx playwright install chromium' first.",
        )?;

        let browser = playwright
            .chromium()
            .launcher()
            .headless(!options.headed)
            .executable(&chromium_path)
            .launch()
            .await
            .context("Failed to launch Chromium browser")?;

        Ok(Self {
            _playwright: playwright,
            browser,
        })
    }

    /// Create a fresh, cookie-less browser context.
    pub async fn new_context(&self) -> Result<BrowserContext> {
        self.browser
            .context_builder()
            .build()
            .await
            .context("Failed to create browser context")
    }

    pub async fn close(self) -> Result<()> {
        self.browser
            .close()
            .await
            .context("Failed to close browser")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_chromium_picks_newest_build() {
        let dir = TempDir::new().unwrap();
        for build in ["chromium-1100", "chromium-1200", "chromium_headless_shell-1300"] {
            let exe = dir.path().join(build).join("chrome-linux");
            std::fs::create_dir_all(&exe).unwrap();
            std::fs::write(exe.join("chrome"), "").unwrap();
        }

        let found = find_chromium_in_cache(dir.path()).unwrap();
        assert!(found.ends_with("chromium-1200/chrome-linux/chrome"));
    }

    #[test]
    fn test_find_chromium_missing_dir() {
        assert!(find_chromium_in_cache(Path::new("/nonexistent/ms-playwright")).is_none());
    }
}
