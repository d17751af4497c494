use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

mod cache;
mod client;
mod config;
mod error;
mod exercises;
mod extract;
mod format;
mod html;
mod markup;
mod preview;
mod resolver;
mod server;
mod types;

use client::KahunasClient;
use config::Config;
use types::{EventFilters, FormatOptions};

#[derive(Parser, Debug)]
#[command(name = "kahunas")]
#[command(about = "Fetch Kahunas workout calendars and render normalized workout days")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $XDG_CONFIG_HOME/kahunas/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, format and cache workouts for a date range
    Workouts {
        /// First day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD), defaults to six days after --from
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only events of this program uuid
        #[arg(long)]
        program: Option<String>,

        /// Only events of this workout uuid
        #[arg(long)]
        workout: Option<String>,

        /// Timezone sent to the calendar API
        #[arg(long)]
        timezone: Option<String>,

        /// Write an HTML view here instead of printing JSON
        #[arg(long)]
        html: Option<PathBuf>,

        /// Do not update the local cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Format previously saved payloads without network access
    Format {
        /// Calendar events JSON (array or {data: [...]})
        #[arg(long)]
        events: PathBuf,

        /// JSON object mapping program uuid to its payload
        #[arg(long)]
        programs: Option<PathBuf>,

        #[arg(long)]
        program: Option<String>,

        #[arg(long)]
        workout: Option<String>,

        #[arg(long)]
        timezone: Option<String>,
    },

    /// Print the raw payload of a program
    Program {
        uuid: String,
    },

    /// Print the raw checkins list
    Checkins,

    /// Render the cached workouts to an HTML file
    View {
        #[arg(short, long, default_value = "workouts.html")]
        output: PathBuf,
    },

    /// Serve the cached workouts over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file if none exists
    Init,
}

/// `RUST_LOG` if set, else `log_level`, with noisy HTTP crates held at warn
fn log_filter(log_level: &str) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    quiet_http_crates(base)
}

fn quiet_http_crates(filter: EnvFilter) -> EnvFilter {
    ["hyper=warn", "reqwest=warn", "tower_http=warn"]
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(filter, EnvFilter::add_directive)
}

fn init_tracing(log_level: &str) {
    fmt()
        .with_env_filter(log_filter(log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn connect(config: &Config) -> Result<KahunasClient> {
    let session = config.auth_session()?;
    if session.is_empty() {
        warn!("Session has neither token nor cookie; requests will likely be rejected");
    }
    Ok(KahunasClient::new(config, &session)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level);

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Commands::Workouts {
            from,
            to,
            program,
            workout,
            timezone,
            html,
            no_cache,
        } => {
            let from = from.unwrap_or_else(|| Utc::now().date_naive());
            let to = to.unwrap_or(from + Duration::days(6));
            let options = FormatOptions {
                timezone: timezone.unwrap_or_else(|| config.timezone.clone()),
                program,
                workout,
            };
            let filters = EventFilters {
                program: options.program.clone(),
                workout: options.workout.clone(),
            };

            let client = connect(&config)?;
            let events = client.calendar_events(from, to, &options.timezone).await?;
            let events = format::filter_events(&events, &filters);
            let programs = client.program_details_for(&events).await?;

            let output = format::format_workout_events_output(&Value::Array(events), &programs, &options);
            let (output, updated_at) = if no_cache {
                let events = format::annotate_workout_event_summaries(&output.events);
                (types::CalendarEventsOutput { events, ..output }, Utc::now())
            } else {
                let cache = cache::save_cache(&config.cache_dir, &output)?;
                (cache.data, cache.updated_at)
            };

            match html {
                Some(path) => {
                    html::generate_html(&output, Some(updated_at), &path)?;
                    info!(path = %path.display(), "HTML saved");
                }
                None => print_json(&output)?,
            }
        }
        Commands::Format {
            events,
            programs,
            program,
            workout,
            timezone,
        } => {
            let options = FormatOptions {
                timezone: timezone.unwrap_or_else(|| config.timezone.clone()),
                program,
                workout,
            };
            let filters = EventFilters {
                program: options.program.clone(),
                workout: options.workout.clone(),
            };

            let events = client::unwrap_event_list(read_json(&events)?);
            let events = format::filter_events(&events, &filters);
            let programs: BTreeMap<String, Value> = match programs {
                Some(path) => serde_json::from_value(read_json(&path)?)
                    .with_context(|| format!("{} is not a JSON object", path.display()))?,
                None => BTreeMap::new(),
            };

            let output = format::format_workout_events_output(&Value::Array(events), &programs, &options);
            print_json(&output)?;
        }
        Commands::Program { uuid } => {
            let client = connect(&config)?;
            match client.program_details(&uuid).await? {
                Value::String(html) => println!("{html}"),
                payload => print_json(&payload)?,
            }
        }
        Commands::Checkins => {
            let client = connect(&config)?;
            print_json(&client.checkins().await?)?;
        }
        Commands::View { output } => {
            let cache = cache::load_cache(&config.cache_dir)?
                .context("No cached workouts yet; run `kahunas workouts` first")?;
            html::generate_html(&cache.data, Some(cache.updated_at), &output)?;
            info!(path = %output.display(), "HTML saved");
        }
        Commands::Serve { port } => {
            server::serve(port, config.cache_dir.clone(), config.timezone.clone()).await?;
        }
        Commands::Config { action } => {
            let path = args.config.unwrap_or_else(Config::default_path);
            match action {
                ConfigAction::Show => {
                    let mut shown = config.clone();
                    if shown.token.is_some() {
                        shown.token = Some("********".to_string());
                    }
                    println!("# {}", path.display());
                    print!("{}", toml::to_string_pretty(&shown)?);
                }
                ConfigAction::Init => {
                    if Config::default().write_new(&path)? {
                        println!("Created {}", path.display());
                    } else {
                        println!("{} already exists", path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_log_filter_honours_level_and_quiets_http_crates() {
        let subscriber = fmt()
            .with_env_filter(quiet_http_crates(EnvFilter::new("info")))
            .with_writer(std::io::sink)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));
            assert!(!tracing::enabled!(target: "hyper", Level::DEBUG));
            assert!(tracing::enabled!(target: "hyper", Level::WARN));
            assert!(!tracing::enabled!(target: "reqwest", Level::INFO));
        });
    }

    #[test]
    fn test_quiet_http_crates_directives() {
        let filter = quiet_http_crates(EnvFilter::new("debug")).to_string();
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("tower_http=warn"));
    }
}
