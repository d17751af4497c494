//! Local cache of the last formatted workouts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::format::annotate_workout_event_summaries;
use crate::types::CalendarEventsOutput;

const CACHE_FILE: &str = "workouts.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutCache {
    pub updated_at: DateTime<Utc>,
    pub data: CalendarEventsOutput,
}

pub fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CACHE_FILE)
}

/// Annotate the output and write it as the current cache
pub fn save_cache(cache_dir: &Path, output: &CalendarEventsOutput) -> Result<WorkoutCache> {
    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create cache dir {}", cache_dir.display()))?;

    let data = CalendarEventsOutput {
        events: annotate_workout_event_summaries(&output.events),
        ..output.clone()
    };
    let cache = WorkoutCache {
        updated_at: Utc::now(),
        data,
    };

    let path = cache_path(cache_dir);
    let json = serde_json::to_string_pretty(&cache)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), events = cache.data.events.len(), "Saved workout cache");
    Ok(cache)
}

/// Read the cache; `None` when it has not been written yet
pub fn load_cache(cache_dir: &Path) -> Result<Option<WorkoutCache>> {
    let path = cache_path(cache_dir);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).context("Failed to read workout cache")?;
    let cache: WorkoutCache =
        serde_json::from_str(&content).context("Failed to parse workout cache")?;

    debug!(count = cache.data.events.len(), "Loaded workout cache");
    Ok(Some(cache))
}
