//! Turn raw calendar events plus program payloads into workout summaries.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use crate::extract::first_text;
use crate::preview::parse_workout_day_preview;
use crate::resolver::{collect_day_candidates, resolve_day_index, select_day_candidate};
use crate::types::{
    CalendarEventsOutput, EventFilters, EventInfo, FormatOptions, ProgramSummary,
    WorkoutDaySummary, WorkoutEventSummary,
};

/// Substrings that identify an embedded day-preview widget
const PREVIEW_MARKERS: [&str; 3] = ["workoutdays_data", "preview_day_content", "table_workout"];

const MAX_DEPTH: usize = 32;

static DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("valid date regex"));

fn string_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

fn event_info(event: &Map<String, Value>) -> EventInfo {
    EventInfo {
        id: event.get("id").cloned().unwrap_or(Value::Null),
        start: string_field(event, "start"),
        end: string_field(event, "end"),
        title: string_field(event, "title"),
    }
}

fn program_summary(uuid: Option<&str>, program: Option<&Value>) -> Option<ProgramSummary> {
    let uuid = uuid?;
    let title = program
        .and_then(Value::as_object)
        .and_then(|p| first_text(p, &["title", "name"]));
    Some(ProgramSummary {
        uuid: uuid.to_string(),
        title,
    })
}

/// First string value (breadth-first) carrying a preview marker
fn find_preview_html(root: &Value) -> Option<&str> {
    let mut queue = VecDeque::from([(root, 0usize)]);

    while let Some((node, depth)) = queue.pop_front() {
        match node {
            Value::String(s) if PREVIEW_MARKERS.iter().any(|m| s.contains(m)) => {
                return Some(s.as_str());
            }
            _ if depth >= MAX_DEPTH => {}
            Value::Array(items) => queue.extend(items.iter().map(|v| (v, depth + 1))),
            Value::Object(record) => queue.extend(record.values().map(|v| (v, depth + 1))),
            _ => {}
        }
    }

    None
}

fn derive_workout_day(
    event: &Value,
    program: Option<&Value>,
    day_index: Option<usize>,
    title: Option<&str>,
) -> Option<WorkoutDaySummary> {
    let preview = find_preview_html(event).or_else(|| program.and_then(find_preview_html));

    if let Some(html) = preview {
        if let Some(day) = parse_workout_day_preview(html, day_index) {
            return Some(day);
        }
        debug!("Preview HTML yielded no exercises, trying structured program");
    }

    let candidates = collect_day_candidates(program?);
    let candidate = select_day_candidate(&candidates, day_index, title)?;
    Some(WorkoutDaySummary::new(
        candidate.index,
        candidate.label.clone(),
        candidate.sections.clone(),
    ))
}

/// Summarize one calendar event against its program payload
pub fn summarize_event(event: &Value, programs: &BTreeMap<String, Value>) -> WorkoutEventSummary {
    let empty = Map::new();
    let record = event.as_object().unwrap_or(&empty);

    let program_uuid = record.get("program").and_then(Value::as_str);
    let program = program_uuid.and_then(|uuid| programs.get(uuid));

    let info = event_info(record);
    let day_index = resolve_day_index(record, program);
    let workout_day = derive_workout_day(event, program, day_index, info.title.as_deref());

    if workout_day.is_none() {
        debug!(event = %info.id, "No workout day resolved");
    }

    WorkoutEventSummary {
        program: program_summary(program_uuid, program),
        event: info,
        workout_day,
    }
}

/// Format calendar events into the output document.
///
/// Non-array `events` input yields an empty event list.
pub fn format_workout_events_output(
    events: &Value,
    programs: &BTreeMap<String, Value>,
    options: &FormatOptions,
) -> CalendarEventsOutput {
    let events = events
        .as_array()
        .map(|items| items.iter().map(|e| summarize_event(e, programs)).collect())
        .unwrap_or_default();

    CalendarEventsOutput {
        source: "calendar".to_string(),
        timezone: options.timezone.clone(),
        filters: EventFilters {
            program: options.program.clone(),
            workout: options.workout.clone(),
        },
        events,
    }
}

/// Keep events matching the program/workout filters
pub fn filter_events(events: &[Value], filters: &EventFilters) -> Vec<Value> {
    let matches = |event: &Value, keys: &[&str], wanted: &Option<String>| match wanted {
        None => true,
        Some(wanted) => keys
            .iter()
            .any(|k| event.get(*k).and_then(Value::as_str) == Some(wanted.as_str())),
    };

    events
        .iter()
        .filter(|e| matches(e, &["program"], &filters.program))
        .filter(|e| matches(e, &["workout", "workout_uuid"], &filters.workout))
        .cloned()
        .collect()
}

fn performed_on(start: &str) -> String {
    DATE_PREFIX
        .captures(start)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| start.to_string())
}

fn annotate_day(day: &WorkoutDaySummary, start: Option<&str>) -> WorkoutDaySummary {
    let mut counter = 0u32;
    let mut day = day.clone();

    for exercise in day
        .sections
        .iter_mut()
        .flat_map(|s| s.groups.iter_mut())
        .flat_map(|g| g.exercises.iter_mut())
    {
        counter += 1;
        exercise.order = Some(
            exercise
                .sequence
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map_or(counter, |s| s.round() as u32),
        );
        if let Some(start) = start {
            exercise.performed_at = Some(start.to_string());
            exercise.performed_on = Some(performed_on(start));
        }
    }

    day
}

/// Stamp order and performed date onto every exercise.
///
/// Returns new summaries; the input is left untouched.
pub fn annotate_workout_event_summaries(events: &[WorkoutEventSummary]) -> Vec<WorkoutEventSummary> {
    events
        .iter()
        .map(|summary| WorkoutEventSummary {
            event: summary.event.clone(),
            program: summary.program.clone(),
            workout_day: summary
                .workout_day
                .as_ref()
                .map(|day| annotate_day(day, summary.event.start.as_deref())),
        })
        .collect()
}
