//! kahunas-login - capture a Kahunas session for the `kahunas` CLI.
//!
//! Uses Playwright to log into the web app with the coach's credentials and
//! stores the resulting cookies and bearer token in the shared auth file.

mod browser;
mod config;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use browser::{BrowserOptions, BrowserSession};
use config::{Credentials, LoginSettings};
use session::{CapturedSession, KahunasSession};

#[derive(Parser)]
#[command(name = "kahunas-login")]
#[command(about = "Log into Kahunas and save the session for the kahunas CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and write the auth file
    Login {
        /// Show browser window instead of running headless
        #[arg(long)]
        headed: bool,

        /// Only login, don't write the session (verify credentials work)
        #[arg(long)]
        dry_run: bool,

        /// Auth file to write
        /// Default: $XDG_CONFIG_HOME/kahunas/auth.json
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Report whether a session has been captured
    Status {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();
    let settings = LoginSettings::from_lookup(|key| std::env::var(key).ok());

    match cli.command {
        Commands::Login {
            headed,
            dry_run,
            output,
        } => {
            let output = output.unwrap_or_else(|| settings.auth_file.clone());
            login_command(settings, headed, dry_run, output).await?;
        }
        Commands::Status { output } => {
            let output = output.unwrap_or(settings.auth_file);
            status_command(&output)?;
        }
    }

    Ok(())
}

async fn login_command(
    settings: LoginSettings,
    headed: bool,
    dry_run: bool,
    output: PathBuf,
) -> Result<()> {
    let credentials = Credentials::from_env().context("Failed to load credentials")?;
    info!("Loaded credentials for: {}", credentials.email);

    let options = BrowserOptions { headed };
    info!(
        "Launching browser ({})",
        if headed { "headed" } else { "headless" }
    );

    let browser = BrowserSession::launch(options)
        .await
        .context("Failed to launch browser")?;
    let context = browser.new_context().await?;

    let session = KahunasSession::new(context, credentials, settings);
    let result = session.run(&output, dry_run).await;

    // Close before reporting so a failed login doesn't leave Chromium running
    browser.close().await?;

    match result {
        Ok(Some(captured)) => {
            info!(
                token = captured.token.is_some(),
                cookie = !captured.cookie.is_empty(),
                "Session captured"
            );
        }
        Ok(None) => {
            info!("Dry run completed successfully");
        }
        Err(e) => {
            error!("Login failed: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

fn status_command(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        println!("No session at {}", path.display());
        println!("Run `kahunas-login login` to create one.");
        return Ok(());
    }

    let session = CapturedSession::read(path)?;
    println!("Session file: {}", path.display());
    println!("Captured at:  {}", session.captured_at);
    println!("Token:        {}", if session.token.is_some() { "yes" } else { "no" });
    println!("Cookies:      {}", if session.cookie.is_empty() { "no" } else { "yes" });
    Ok(())
}
