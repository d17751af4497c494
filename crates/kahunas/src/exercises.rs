//! Exercise extraction from structured program JSON.
//!
//! Payload shapes seen in the wild:
//! - flat arrays of exercise objects
//! - `{warmup, workout, cooldown}` keyed objects
//! - `exercise_list.{warmup,workout,cooldown}` arrays of groups with a `list`
//! - wrapper objects holding the real fields under `exercise`

use serde_json::{Map, Value};

use crate::extract::{first_text, non_empty, parse_body_parts, parse_media, parse_number};
use crate::types::{
    WorkoutExerciseGroup, WorkoutExerciseSummary, WorkoutSectionSummary, SECTION_KINDS,
};

/// Nesting limit when hunting for exercises inside wrapper objects
const MAX_DEPTH: usize = 16;

/// Keys for each section, in `SECTION_KINDS` order
const EXERCISE_LIST_KEYS: [&[&str]; 3] = [
    &["warmup", "warm_up"],
    &["workout", "exercises"],
    &["cooldown", "cool_down"],
];

fn nested_exercise(record: &Map<String, Value>) -> Option<&Map<String, Value>> {
    record.get("exercise").and_then(Value::as_object)
}

fn has_identity(record: &Map<String, Value>) -> bool {
    let is_str = |key: &str| record.get(key).is_some_and(Value::is_string);
    is_str("exercise_name")
        || is_str("exercise_uuid")
        || (is_str("name") && (record.contains_key("sets") || record.contains_key("reps")))
}

/// Whether an object is an exercise rather than some unrelated nested record
pub fn looks_like_exercise_record(record: &Map<String, Value>) -> bool {
    if has_identity(record) {
        return true;
    }
    nested_exercise(record).is_some_and(|inner| {
        has_identity(inner)
            || (inner.get("name").is_some_and(Value::is_string)
                && (record.contains_key("sets") || record.contains_key("reps")))
            || inner.get("title").is_some_and(Value::is_string)
    })
}

/// Resolve a field on the record first, then on its nested `exercise` object
fn lookup<'a>(
    record: &'a Map<String, Value>,
    inner: Option<&'a Map<String, Value>>,
    keys: &[&str],
) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| record.get(*k).filter(|v| !v.is_null()))
        .or_else(|| inner.and_then(|i| keys.iter().find_map(|k| i.get(*k).filter(|v| !v.is_null()))))
}

fn lookup_number(
    record: &Map<String, Value>,
    inner: Option<&Map<String, Value>>,
    keys: &[&str],
) -> Option<f64> {
    lookup(record, inner, keys).and_then(parse_number)
}

fn lookup_text(
    record: &Map<String, Value>,
    inner: Option<&Map<String, Value>>,
    keys: &[&str],
) -> Option<String> {
    first_text(record, keys).or_else(|| inner.and_then(|i| first_text(i, keys)))
}

/// Build an exercise from a JSON record
pub fn exercise_from_record(record: &Map<String, Value>) -> Option<WorkoutExerciseSummary> {
    let inner = nested_exercise(record);

    let name = first_text(record, &["exercise_name", "name"])
        .or_else(|| inner.and_then(|i| first_text(i, &["name", "exercise_name", "title"])))?;

    Some(WorkoutExerciseSummary {
        name,
        uuid: lookup_text(record, inner, &["exercise_uuid", "uuid"]),
        order: None,
        sets: lookup_number(record, inner, &["sets"]),
        reps: lookup_text(record, inner, &["reps"]),
        rest_seconds: lookup_number(record, inner, &["rest_period", "rest_seconds", "rest"]),
        time_seconds: lookup_number(record, inner, &["time_period", "time_seconds", "time"]),
        notes: lookup_text(record, inner, &["notes", "note"]),
        sequence: lookup_number(record, inner, &["number", "sequence"]),
        performed_at: None,
        performed_on: None,
        body_parts: lookup(record, inner, &["bodypart", "body_parts", "body_part"])
            .and_then(|v| non_empty(parse_body_parts(v))),
        media: lookup(record, inner, &["media"]).and_then(|v| non_empty(parse_media(v))),
    })
}

fn collect_into(value: &Value, depth: usize, out: &mut Vec<WorkoutExerciseSummary>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_into(item, depth + 1, out);
            }
        }
        Value::Object(record) if looks_like_exercise_record(record) => {
            if let Some(exercise) = exercise_from_record(record) {
                out.push(exercise);
            }
        }
        Value::Object(record) => {
            for child in record.values() {
                if child.is_array() || child.is_object() {
                    collect_into(child, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

/// Every exercise found under `value`, in document order
pub fn collect_exercises(value: &Value) -> Vec<WorkoutExerciseSummary> {
    let mut out = Vec::new();
    collect_into(value, 0, &mut out);
    out
}

/// Sort by sequence (unsequenced entries last, relative order kept) and wrap
/// each exercise as its own straight group
pub fn wrap_exercises(mut exercises: Vec<WorkoutExerciseSummary>) -> Vec<WorkoutExerciseGroup> {
    exercises.sort_by(|a, b| match (a.sequence, b.sequence) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    exercises.into_iter().map(WorkoutExerciseGroup::straight).collect()
}

fn first_key<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| record.get(*k))
}

fn groups_from_exercise_list(groups: &Value) -> Vec<WorkoutExerciseGroup> {
    let Some(items) = groups.as_array() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for item in items {
        let Some(group) = item.as_object() else {
            continue;
        };

        let Some(list) = group.get("list") else {
            // A bare exercise sitting where a group was expected
            if looks_like_exercise_record(group) {
                out.extend(exercise_from_record(group).map(WorkoutExerciseGroup::straight));
            }
            continue;
        };

        let exercises = collect_exercises(list);
        if exercises.is_empty() {
            continue;
        }

        let is_superset = group
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.to_ascii_lowercase().contains("superset"));

        if is_superset {
            let label = first_text(group, &["title", "name", "label"]);
            out.push(WorkoutExerciseGroup::superset(label, exercises));
        } else {
            out.extend(exercises.into_iter().map(WorkoutExerciseGroup::straight));
        }
    }
    out
}

/// Sections from the `exercise_list` shape
pub fn extract_sections_from_exercise_list(record: &Map<String, Value>) -> Vec<WorkoutSectionSummary> {
    let Some(list) = record.get("exercise_list").and_then(Value::as_object) else {
        return Vec::new();
    };

    SECTION_KINDS
        .iter()
        .zip(EXERCISE_LIST_KEYS)
        .filter_map(|((section_type, label), keys)| {
            let groups = first_key(list, keys).map(groups_from_exercise_list)?;
            (!groups.is_empty()).then(|| WorkoutSectionSummary {
                section_type: *section_type,
                label: label.to_string(),
                groups,
            })
        })
        .collect()
}

/// Sections from the flatter `warmup`/`workout`/`exercises`/`cooldown` keys
fn extract_flat_sections(record: &Map<String, Value>) -> Vec<WorkoutSectionSummary> {
    SECTION_KINDS
        .iter()
        .zip(EXERCISE_LIST_KEYS)
        .filter_map(|((section_type, label), keys)| {
            let exercises = keys
                .iter()
                .filter_map(|k| record.get(*k))
                .map(collect_exercises)
                .find(|found| !found.is_empty())?;
            Some(WorkoutSectionSummary {
                section_type: *section_type,
                label: label.to_string(),
                groups: wrap_exercises(exercises),
            })
        })
        .collect()
}

/// All sections a record holds; `exercise_list` wins over the flat keys
pub fn extract_sections(record: &Map<String, Value>) -> Vec<WorkoutSectionSummary> {
    let sections = extract_sections_from_exercise_list(record);
    if !sections.is_empty() {
        return sections;
    }
    extract_flat_sections(record)
}
