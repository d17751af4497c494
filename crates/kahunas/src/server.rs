use axum::{extract::State, http::StatusCode, response::Html, routing::get, Json, Router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cache::{self, WorkoutCache};
use crate::html;
use crate::types::{CalendarEventsOutput, EventFilters};

/// Application state shared across requests
pub struct AppState {
    pub cache: RwLock<Option<WorkoutCache>>,
    pub cache_dir: PathBuf,
    pub timezone: String,
}

impl AppState {
    pub fn new(cache_dir: PathBuf, timezone: String) -> anyhow::Result<Self> {
        let cache = cache::load_cache(&cache_dir)?;
        if cache.is_none() {
            warn!(dir = %cache_dir.display(), "No cached workouts yet; run `kahunas workouts` first");
        }
        Ok(Self {
            cache: RwLock::new(cache),
            cache_dir,
            timezone,
        })
    }

    fn empty_output(&self) -> CalendarEventsOutput {
        CalendarEventsOutput {
            source: "calendar".to_string(),
            timezone: self.timezone.clone(),
            filters: EventFilters::default(),
            events: Vec::new(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/events", get(events_handler))
        .route("/api/refresh", get(refresh_handler))
        .with_state(state)
}

/// Serve the cached workout view
pub async fn serve(port: u16, cache_dir: PathBuf, timezone: String) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(cache_dir, timezone)?);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let cache = state.cache.read().await;
    let markup = match cache.as_ref() {
        Some(cache) => html::render_page(&cache.data, Some(cache.updated_at)),
        None => html::render_page(&state.empty_output(), None),
    };
    Html(markup.into_string())
}

/// Cached output as JSON
async fn events_handler(State(state): State<Arc<AppState>>) -> Json<CalendarEventsOutput> {
    let cache = state.cache.read().await;
    Json(
        cache
            .as_ref()
            .map(|c| c.data.clone())
            .unwrap_or_else(|| state.empty_output()),
    )
}

/// Reload the cache file from disk
async fn refresh_handler(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match cache::load_cache(&state.cache_dir) {
        Ok(fresh) => {
            info!(found = fresh.is_some(), "Reloaded workout cache");
            *state.cache.write().await = fresh;
            (StatusCode::OK, "OK")
        }
        Err(e) => {
            error!(error = %e, "Refresh failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "ERROR")
        }
    }
}
