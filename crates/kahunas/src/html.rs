use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::types::{
    CalendarEventsOutput, GroupType, WorkoutDaySummary, WorkoutEventSummary, WorkoutExerciseGroup,
    WorkoutExerciseSummary,
};

/// Write the workout view to `path`
pub fn generate_html(output: &CalendarEventsOutput, updated_at: Option<DateTime<Utc>>, path: &Path) -> Result<()> {
    let html = render_page(output, updated_at);
    fs::write(path, html.into_string()).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Render a number without a trailing `.0`
fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", (n * 100.0).round() / 100.0)
    }
}

fn event_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => "event".to_string(),
        other => other.to_string(),
    }
}

pub fn render_page(output: &CalendarEventsOutput, updated_at: Option<DateTime<Utc>>) -> Markup {
    let total_count = output.events.len();

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Kahunas Workouts" }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.container {
                    h1 { "Workouts" }
                    div.stats {
                        span #"total-count" { (total_count) }
                        " sessions · " (output.timezone)
                        @if let Some(updated_at) = updated_at {
                            " · updated " (updated_at.format("%Y-%m-%d %H:%M UTC").to_string())
                        }
                    }
                    div.event-list #"event-list" {
                        @if output.events.is_empty() {
                            div.empty-state {
                                p { "No workouts in range." }
                            }
                        } @else {
                            @for summary in &output.events {
                                (render_event(summary))
                            }
                        }
                    }
                }
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

fn render_event(summary: &WorkoutEventSummary) -> Markup {
    let key = event_key(&summary.event.id);
    let title = summary
        .event
        .title
        .as_deref()
        .or(summary.workout_day.as_ref().and_then(|d| d.day_label.as_deref()))
        .unwrap_or("Workout");

    html! {
        div.event-card data-event-id=(key) {
            div.event-header {
                span.event-title { (title) }
                @if let Some(start) = &summary.event.start {
                    span.event-date { (start) }
                }
            }
            @if let Some(program) = &summary.program {
                div.event-program { (program.title.as_deref().unwrap_or(&program.uuid)) }
            }
            @match &summary.workout_day {
                Some(day) => {
                    (render_day(&key, day))
                },
                None => {
                    div.empty-state { p { "No workout details found." } }
                },
            }
        }
    }
}

fn render_day(key: &str, day: &WorkoutDaySummary) -> Markup {
    html! {
        @if !day.total_volume_sets.is_empty() {
            div.volume-strip {
                @for entry in &day.total_volume_sets {
                    span.volume-chip { (entry.body_part) " " strong { (fmt_number(entry.sets)) } }
                }
            }
        }
        @for section in &day.sections {
            div.section {
                div.section-label { (section.label) }
                @for group in &section.groups {
                    (render_group(key, group))
                }
            }
        }
    }
}

fn render_group(key: &str, group: &WorkoutExerciseGroup) -> Markup {
    html! {
        @match group.group_type {
            GroupType::Superset => {
                div.superset {
                    div.superset-label { (group.label.as_deref().unwrap_or("Superset")) }
                    @for exercise in &group.exercises {
                        (render_exercise(key, exercise))
                    }
                }
            },
            GroupType::Straight => {
                @for exercise in &group.exercises {
                    (render_exercise(key, exercise))
                }
            },
        }
    }
}

fn render_exercise(key: &str, exercise: &WorkoutExerciseSummary) -> Markup {
    let done_key = match exercise.order {
        Some(order) => format!("{key}-{order}"),
        None => format!("{key}-{}", exercise.name),
    };

    html! {
        div.exercise-item data-done-key=(done_key) {
            input.exercise-checkbox type="checkbox" data-done-key=(done_key);
            div.exercise-content {
                div.exercise-name {
                    @if let Some(order) = exercise.order {
                        span.exercise-order { (order) }
                    }
                    (exercise.name)
                }
                div.exercise-meta {
                    @if let Some(sets) = exercise.sets {
                        span { (fmt_number(sets)) " sets" }
                    }
                    @if let Some(reps) = &exercise.reps {
                        span { (reps) " reps" }
                    }
                    @if let Some(rest) = exercise.rest_seconds {
                        span { (fmt_number(rest)) "s rest" }
                    }
                    @if let Some(time) = exercise.time_seconds {
                        span { (fmt_number(time)) "s" }
                    }
                }
                @if let Some(notes) = &exercise.notes {
                    div.exercise-notes { (notes) }
                }
                @if let Some(media) = &exercise.media {
                    div.exercise-media {
                        @for item in media {
                            a href=(item.url) target="_blank" rel="noopener" {
                                (item.kind.as_deref().unwrap_or("demo"))
                            }
                        }
                    }
                }
            }
        }
    }
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif;
    background: #0d0f12;
    color: #f2f2f2;
    min-height: 100vh;
    line-height: 1.45;
}

.container {
    max-width: 900px;
    margin: 0 auto;
    padding: 40px 20px 60px;
}

h1 {
    font-weight: 900;
    font-size: 3em;
    letter-spacing: -0.02em;
    text-transform: uppercase;
    margin-bottom: 4px;
}

.stats {
    color: #8a8f98;
    font-size: 0.85em;
    font-weight: 700;
    text-transform: uppercase;
    letter-spacing: 0.08em;
    margin-bottom: 36px;
}

.event-list {
    display: grid;
    gap: 28px;
}

.event-card {
    background: rgba(255,255,255,0.03);
    border: 1px solid rgba(255,255,255,0.08);
    border-left: 4px solid #3ddc97;
    padding: 20px;
}

.event-header {
    display: flex;
    justify-content: space-between;
    align-items: baseline;
    gap: 12px;
}

.event-title {
    font-weight: 800;
    font-size: 1.2em;
    text-transform: uppercase;
}

.event-date, .event-program {
    color: #8a8f98;
    font-size: 0.85em;
}

.volume-strip {
    display: flex;
    flex-wrap: wrap;
    gap: 8px;
    margin: 14px 0;
}

.volume-chip {
    background: rgba(61,220,151,0.12);
    border: 1px solid rgba(61,220,151,0.4);
    font-size: 0.75em;
    padding: 3px 8px;
    text-transform: uppercase;
}

.section {
    margin-top: 16px;
}

.section-label {
    color: #3ddc97;
    font-weight: 800;
    font-size: 0.8em;
    letter-spacing: 0.12em;
    text-transform: uppercase;
    margin-bottom: 8px;
}

.superset {
    border-left: 2px dashed #f5a623;
    padding-left: 12px;
    margin-bottom: 10px;
}

.superset-label {
    color: #f5a623;
    font-size: 0.7em;
    text-transform: uppercase;
    letter-spacing: 0.1em;
    margin-bottom: 4px;
}

.exercise-item {
    display: flex;
    gap: 14px;
    padding: 10px 0;
    border-bottom: 1px solid rgba(255,255,255,0.05);
}

.exercise-item.completed {
    opacity: 0.35;
}

.exercise-item.completed .exercise-name {
    text-decoration: line-through;
}

.exercise-checkbox {
    width: 20px;
    height: 20px;
    min-width: 20px;
    margin-top: 2px;
    accent-color: #3ddc97;
    cursor: pointer;
}

.exercise-name {
    font-weight: 700;
}

.exercise-order {
    color: #8a8f98;
    margin-right: 8px;
}

.exercise-meta {
    display: flex;
    gap: 12px;
    color: #b5b9c0;
    font-size: 0.85em;
}

.exercise-notes {
    color: #8a8f98;
    font-size: 0.85em;
    font-style: italic;
}

.exercise-media a {
    color: #3ddc97;
    font-size: 0.8em;
    margin-right: 8px;
}

.empty-state {
    padding: 24px 0;
    color: #666;
    font-size: 0.9em;
}
"#;

const JAVASCRIPT: &str = r#"
const STORAGE_KEY = 'kahunas-done';

function loadDone() {
    return JSON.parse(localStorage.getItem(STORAGE_KEY) || '{}');
}

function markItem(key, checked) {
    document.querySelectorAll(`.exercise-item[data-done-key="${key}"]`).forEach(item => {
        item.classList.toggle('completed', checked);
    });
}

document.querySelectorAll('.exercise-checkbox').forEach(checkbox => {
    const key = checkbox.getAttribute('data-done-key');
    const done = loadDone();
    if (done[key]) {
        checkbox.checked = true;
        markItem(key, true);
    }

    checkbox.addEventListener('change', function() {
        const states = loadDone();
        states[key] = this.checked;
        localStorage.setItem(STORAGE_KEY, JSON.stringify(states));
        markItem(key, this.checked);
    });
});
"#;
