//! Map a calendar event onto the right day of a program.
//!
//! Program payloads are arbitrary JSON trees; lookups walk them breadth-first
//! with a depth cap so pathological input cannot stall a run.

use serde_json::{Map, Value};
use std::collections::VecDeque;
use tracing::trace;

use crate::exercises::extract_sections;
use crate::extract::{first_text, parse_index, parse_text};
use crate::types::WorkoutSectionSummary;

/// Day index fields, in priority order
const DAY_INDEX_KEYS: [&str; 6] = [
    "day_index",
    "workout_day_index",
    "day",
    "workout_day",
    "day_number",
    "workout_day_number",
];

const DAY_LABEL_KEYS: [&str; 4] = ["title", "name", "day_name", "label"];

const MAX_DEPTH: usize = 32;

/// Read the day index a record declares about itself.
///
/// `*_number` fields count from 1 and are shifted to 0-based.
pub fn explicit_day_index(record: &Map<String, Value>) -> Option<usize> {
    DAY_INDEX_KEYS.iter().find_map(|key| {
        let index = parse_index(record.get(*key)?)?;
        if key.ends_with("_number") {
            index.checked_sub(1)
        } else {
            Some(index)
        }
    })
}

/// A node visited during a breadth-first walk, with its position in the parent array
struct Visit<'a> {
    node: &'a Value,
    position: Option<usize>,
    depth: usize,
}

/// Breadth-first walk over every object in `root`; `visit` returns `Some` to stop
fn walk_objects<'a, T>(
    root: &'a Value,
    mut visit: impl FnMut(&'a Map<String, Value>, Option<usize>) -> Option<T>,
) -> Option<T> {
    let mut queue = VecDeque::from([Visit {
        node: root,
        position: None,
        depth: 0,
    }]);

    while let Some(Visit {
        node,
        position,
        depth,
    }) = queue.pop_front()
    {
        if let Value::Object(record) = node {
            if let Some(found) = visit(record, position) {
                return Some(found);
            }
        }
        if depth >= MAX_DEPTH {
            continue;
        }
        match node {
            Value::Array(items) => queue.extend(items.iter().enumerate().map(|(i, item)| Visit {
                node: item,
                position: Some(i),
                depth: depth + 1,
            })),
            Value::Object(record) => queue.extend(record.values().map(|child| Visit {
                node: child,
                position: None,
                depth: depth + 1,
            })),
            _ => {}
        }
    }

    None
}

fn value_as_key(value: &Value) -> Option<String> {
    parse_text(value)
}

fn field_equals(record: &Map<String, Value>, keys: &[&str], wanted: &str) -> bool {
    keys.iter()
        .any(|k| record.get(*k).and_then(value_as_key).is_some_and(|v| v == wanted))
}

/// Find the first node matching `keys == wanted` and return its day index
fn find_day_index_by(program: &Value, keys: &[&str], wanted: &str) -> Option<usize> {
    walk_objects(program, |record, position| {
        if !field_equals(record, keys, wanted) {
            return None;
        }
        explicit_day_index(record).or(position)
    })
}

fn event_key(event: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| event.get(*k).and_then(value_as_key))
}

/// Determine which program day an event refers to.
///
/// Strategies, first hit wins: explicit index fields on the event, then
/// workout uuid, workout-day uuid and workout-day id lookups in the program.
pub fn resolve_day_index(event: &Map<String, Value>, program: Option<&Value>) -> Option<usize> {
    if let Some(index) = explicit_day_index(event) {
        trace!(index, "Day index from event fields");
        return Some(index);
    }

    let program = program?;

    let lookups: [(&[&str], &[&str]); 3] = [
        (&["workout", "workout_uuid"], &["workout_uuid", "workout", "uuid"]),
        (&["workout_day_uuid"], &["uuid"]),
        (&["workout_day_id", "day_id"], &["id"]),
    ];

    lookups.iter().find_map(|(event_keys, node_keys)| {
        let wanted = event_key(event, event_keys)?;
        let index = find_day_index_by(program, node_keys, &wanted)?;
        trace!(index, key = event_keys[0], "Day index from program lookup");
        Some(index)
    })
}

/// A program node that holds a day's worth of exercises
#[derive(Debug, Clone, PartialEq)]
pub struct DayCandidate {
    pub index: Option<usize>,
    pub label: Option<String>,
    pub sections: Vec<WorkoutSectionSummary>,
}

/// Every node of the program tree with extractable sections, breadth-first.
///
/// Candidate nodes are not searched further.
pub fn collect_day_candidates(program: &Value) -> Vec<DayCandidate> {
    let mut candidates = Vec::new();
    let mut queue = VecDeque::from([(program, None::<usize>, 0usize)]);

    while let Some((node, position, depth)) = queue.pop_front() {
        if let Value::Object(record) = node {
            let sections = extract_sections(record);
            if !sections.is_empty() {
                let index = explicit_day_index(record).or(position);
                let label = first_text(record, &DAY_LABEL_KEYS)
                    .or_else(|| index.map(|i| format!("Day {}", i + 1)));
                candidates.push(DayCandidate {
                    index,
                    label,
                    sections,
                });
                continue;
            }
        }
        if depth >= MAX_DEPTH {
            continue;
        }
        match node {
            Value::Array(items) => queue.extend(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (item, Some(i), depth + 1)),
            ),
            Value::Object(record) => {
                queue.extend(record.values().map(|child| (child, None, depth + 1)))
            }
            _ => {}
        }
    }

    candidates
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Pick the candidate for an event: by index, then by title, then the only
/// candidate. Ambiguity resolves to `None`.
pub fn select_day_candidate<'a>(
    candidates: &'a [DayCandidate],
    day_index: Option<usize>,
    title: Option<&str>,
) -> Option<&'a DayCandidate> {
    if let Some(index) = day_index {
        if let Some(found) = candidates.iter().find(|c| c.index == Some(index)) {
            return Some(found);
        }
    }

    if let Some(title) = title.map(normalize_title).filter(|t| !t.is_empty()) {
        let labelled = || {
            candidates.iter().filter_map(|c| {
                let label = normalize_title(c.label.as_deref()?);
                (!label.is_empty()).then_some((c, label))
            })
        };

        if let Some((found, _)) = labelled().find(|(_, label)| *label == title) {
            return Some(found);
        }
        if let Some((found, _)) =
            labelled().find(|(_, label)| title.contains(label.as_str()) || label.contains(&title))
        {
            return Some(found);
        }
    }

    if candidates.len() == 1 {
        return candidates.first();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn program_with_days() -> Value {
        json!({
            "uuid": "p1",
            "title": "Strength Block",
            "days": [
                {"id": 11, "uuid": "d-a", "workout_uuid": "w-a", "title": "Day 1: Anterior",
                 "workout": [{"exercise_name": "Squat"}]},
                {"id": 12, "uuid": "d-b", "workout_uuid": "w-b", "title": "Day 2: Posterior",
                 "workout": [{"exercise_name": "Deadlift"}]},
                {"id": 13, "uuid": "d-c", "workout_uuid": "w-c",
                 "workout": [{"exercise_name": "Press"}]}
            ]
        })
    }

    // ========== explicit_day_index tests ==========

    #[test]
    fn test_explicit_day_index_priority() {
        let event = obj(json!({"day": 4, "day_index": 2, "workout_day": 9}));
        assert_eq!(explicit_day_index(&event), Some(2));
    }

    #[test]
    fn test_explicit_day_number_is_one_based() {
        assert_eq!(explicit_day_index(&obj(json!({"day_number": 2}))), Some(1));
        assert_eq!(explicit_day_index(&obj(json!({"day_number": "1"}))), Some(0));
        assert_eq!(explicit_day_index(&obj(json!({"day_number": 0}))), None);
    }

    #[test]
    fn test_explicit_day_index_skips_unusable_values() {
        let event = obj(json!({"day_index": "soon", "workout_day_index": "3"}));
        assert_eq!(explicit_day_index(&event), Some(3));
        assert_eq!(explicit_day_index(&obj(json!({"title": "x"}))), None);
    }

    #[test]
    fn test_explicit_day_index_ignores_dates() {
        assert_eq!(explicit_day_index(&obj(json!({"day": "2025-01-02"}))), None);
    }

    // ========== resolve_day_index tests ==========

    #[test]
    fn test_resolve_from_event_fields_first() {
        let event = obj(json!({"day_index": 0, "workout": "w-c"}));
        assert_eq!(resolve_day_index(&event, Some(&program_with_days())), Some(0));
    }

    #[test]
    fn test_resolve_by_workout_uuid_uses_position() {
        let event = obj(json!({"workout": "w-b"}));
        assert_eq!(resolve_day_index(&event, Some(&program_with_days())), Some(1));
    }

    #[test]
    fn test_resolve_by_workout_uuid_prefers_node_index() {
        let program = json!({"days": [{"workout_uuid": "w-x", "day_index": 5}]});
        let event = obj(json!({"workout_uuid": "w-x"}));
        assert_eq!(resolve_day_index(&event, Some(&program)), Some(5));
    }

    #[test]
    fn test_resolve_by_workout_day_uuid() {
        let event = obj(json!({"workout_day_uuid": "d-c"}));
        assert_eq!(resolve_day_index(&event, Some(&program_with_days())), Some(2));
    }

    #[test]
    fn test_resolve_uuid_in_index_field_falls_through() {
        let event = obj(json!({
            "workout_day": "2f9c1e7a-4b1d-4c1e-9d55-0a1b2c3d4e5f",
            "workout_day_uuid": "d-b"
        }));
        assert_eq!(resolve_day_index(&event, Some(&program_with_days())), Some(1));
    }

    #[test]
    fn test_resolve_by_workout_day_id_number_or_string() {
        let program = program_with_days();
        assert_eq!(resolve_day_index(&obj(json!({"workout_day_id": 12})), Some(&program)), Some(1));
        assert_eq!(resolve_day_index(&obj(json!({"day_id": "13"})), Some(&program)), Some(2));
    }

    #[test]
    fn test_resolve_unknown_references() {
        let event = obj(json!({"workout": "missing", "day_id": 99}));
        assert_eq!(resolve_day_index(&event, Some(&program_with_days())), None);
        assert_eq!(resolve_day_index(&event, None), None);
    }

    #[test]
    fn test_resolve_deeply_nested_program_terminates() {
        let mut program = json!({"workout_uuid": "deep"});
        for _ in 0..200 {
            program = json!({"wrap": [program]});
        }
        let event = obj(json!({"workout": "deep"}));
        assert_eq!(resolve_day_index(&event, Some(&program)), None);
    }

    // ========== collect_day_candidates tests ==========

    #[test]
    fn test_collect_day_candidates() {
        let candidates = collect_day_candidates(&program_with_days());
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[1].index, Some(1));
        assert_eq!(candidates[1].label.as_deref(), Some("Day 2: Posterior"));
        assert_eq!(candidates[2].label.as_deref(), Some("Day 3"));
    }

    #[test]
    fn test_collect_day_candidates_uses_day_number() {
        let program = json!({"days": [
            {"day_number": 2, "exercises": [{"exercise_name": "Row"}]}
        ]});
        let candidates = collect_day_candidates(&program);
        assert_eq!(candidates[0].index, Some(1));
        assert_eq!(candidates[0].label.as_deref(), Some("Day 2"));
    }

    #[test]
    fn test_collect_day_candidates_empty_program() {
        assert!(collect_day_candidates(&json!({"title": "Empty"})).is_empty());
        assert!(collect_day_candidates(&json!("<div></div>")).is_empty());
    }

    // ========== select_day_candidate tests ==========

    #[test]
    fn test_select_by_index() {
        let candidates = collect_day_candidates(&program_with_days());
        let found = select_day_candidate(&candidates, Some(2), Some("Day 1: Anterior")).unwrap();
        assert_eq!(found.index, Some(2));
    }

    #[test]
    fn test_select_by_exact_title_before_substring() {
        let program = json!({"days": [
            {"day_index": 1, "workout": [{"exercise_name": "A"}]},
            {"title": "Day 2: Posterior", "workout": [{"exercise_name": "B"}]}
        ]});
        let candidates = collect_day_candidates(&program);
        assert_eq!(candidates[0].label.as_deref(), Some("Day 2"));
        // "day 2" is a substring of the title, but the exact label wins
        let found = select_day_candidate(&candidates, None, Some("  day 2: POSTERIOR ")).unwrap();
        assert_eq!(found.sections[0].groups[0].exercises[0].name, "B");
    }

    #[test]
    fn test_select_by_substring_both_ways() {
        let candidates = collect_day_candidates(&program_with_days());
        let found = select_day_candidate(&candidates, None, Some("Posterior")).unwrap();
        assert_eq!(found.index, Some(1));

        let found = select_day_candidate(&candidates, None, Some("Week 3 - Day 1: Anterior (deload)")).unwrap();
        assert_eq!(found.index, Some(0));
    }

    #[test]
    fn test_select_single_candidate_fallback() {
        let program = json!({"workout": [{"exercise_name": "Solo"}]});
        let candidates = collect_day_candidates(&program);
        assert!(select_day_candidate(&candidates, Some(7), Some("Anything")).is_some());
    }

    #[test]
    fn test_select_ambiguous_is_none() {
        let candidates = collect_day_candidates(&program_with_days());
        assert!(select_day_candidate(&candidates, None, Some("Upper")).is_none());
        assert!(select_day_candidate(&candidates, None, None).is_none());
    }
}
