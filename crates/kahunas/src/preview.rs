//! Parse the platform's rendered day-preview widget into a workout day.

use std::collections::BTreeMap;
use tracing::debug;

use crate::extract::{non_empty, parse_body_parts_attr, parse_float_prefix, parse_media_attr};
use crate::markup::{
    extract_attribute, extract_data_attributes, extract_section_html, extract_table_block,
    extract_workout_day_blocks, find_open_tags, select_workout_day_block,
};
use crate::types::{
    SectionType, WorkoutDaySummary, WorkoutExerciseGroup, WorkoutExerciseSummary,
    WorkoutSectionSummary, SECTION_KINDS,
};

/// Class markers of the three section containers, in `SECTION_KINDS` order
const SECTION_MARKERS: [&str; 3] = ["warmup_exercises", "workout_exercises", "cooldown_exercises"];

/// Attributes on the day block that may carry its display name
const DAY_LABEL_ATTRS: [&str; 3] = ["day_name", "title", "name"];

fn attr_text(attrs: &BTreeMap<String, String>, key: &str) -> Option<String> {
    attrs
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn attr_number(attrs: &BTreeMap<String, String>, key: &str) -> Option<f64> {
    attrs.get(key).and_then(|v| parse_float_prefix(v))
}

/// Build an exercise from the `data-*` attributes of a `<tr>` row
pub fn exercise_from_attributes(attrs: &BTreeMap<String, String>) -> Option<WorkoutExerciseSummary> {
    let name = attr_text(attrs, "exercise_name")?;

    Some(WorkoutExerciseSummary {
        name,
        uuid: attr_text(attrs, "exercise_uuid"),
        order: None,
        sets: attr_number(attrs, "sets"),
        reps: attr_text(attrs, "reps"),
        rest_seconds: attr_number(attrs, "rest_period"),
        time_seconds: attr_number(attrs, "time_period"),
        notes: attr_text(attrs, "notes"),
        sequence: attr_number(attrs, "number"),
        performed_at: None,
        performed_on: None,
        body_parts: attrs
            .get("bodypart")
            .and_then(|raw| non_empty(parse_body_parts_attr(raw))),
        media: attrs
            .get("media")
            .and_then(|raw| non_empty(parse_media_attr(raw))),
    })
}

struct ExerciseRow {
    offset: usize,
    is_subrow: bool,
    exercise: WorkoutExerciseSummary,
}

fn exercise_rows(html: &str) -> Vec<ExerciseRow> {
    find_open_tags(html, "tr")
        .into_iter()
        .filter_map(|(offset, tag)| {
            let attrs = extract_data_attributes(tag);
            let exercise = exercise_from_attributes(&attrs)?;
            let is_subrow = extract_attribute(tag, "class")
                .is_some_and(|class| class.to_ascii_lowercase().contains("subrow"));
            Some(ExerciseRow {
                offset,
                is_subrow,
                exercise,
            })
        })
        .collect()
}

/// Byte ranges of the outermost tables that mention "Superset"
fn superset_table_ranges(html: &str) -> Vec<(usize, usize)> {
    let candidates: Vec<(usize, usize)> = find_open_tags(html, "table")
        .into_iter()
        .filter_map(|(start, _)| {
            let block = extract_table_block(html, start);
            block
                .to_ascii_lowercase()
                .contains("superset")
                .then(|| (start, start + block.len()))
        })
        .collect();

    candidates
        .iter()
        .enumerate()
        .filter(|(i, (start, end))| {
            !candidates.iter().enumerate().any(|(j, (other_start, other_end))| {
                j != *i
                    && other_start <= start
                    && end <= other_end
                    && (other_end - other_start) >= (end - start)
            })
        })
        .map(|(_, range)| *range)
        .collect()
}

/// Build the ordered groups of one section: supersets from their tables,
/// every other top-level row as its own straight set.
pub fn build_exercise_groups(html: &str) -> Vec<WorkoutExerciseGroup> {
    let rows = exercise_rows(html);
    let supersets = superset_table_ranges(html);

    let mut grouped: Vec<(usize, WorkoutExerciseGroup)> = Vec::new();
    let mut superset_members: Vec<Vec<WorkoutExerciseSummary>> = vec![Vec::new(); supersets.len()];

    for row in rows {
        let container = supersets
            .iter()
            .position(|(start, end)| *start <= row.offset && row.offset < *end);
        match container {
            Some(i) => superset_members[i].push(row.exercise),
            None if row.is_subrow => {}
            None => grouped.push((row.offset, WorkoutExerciseGroup::straight(row.exercise))),
        }
    }

    for ((start, _), members) in supersets.iter().zip(superset_members) {
        if !members.is_empty() {
            grouped.push((
                *start,
                WorkoutExerciseGroup::superset(Some("Superset".to_string()), members),
            ));
        }
    }

    // Stable, so document order is kept between groups at the same offset
    grouped.sort_by_key(|(offset, _)| *offset);
    grouped.into_iter().map(|(_, group)| group).collect()
}

/// Split a day block into its warm-up, workout and cooldown sections
pub fn build_sections(day_html: &str) -> Vec<WorkoutSectionSummary> {
    let marked: Vec<(SectionType, &str, &str)> = SECTION_KINDS
        .iter()
        .zip(SECTION_MARKERS)
        .filter_map(|((section_type, label), marker)| {
            extract_section_html(day_html, marker).map(|html| (*section_type, *label, html))
        })
        .collect();

    let sources = if marked.is_empty() {
        vec![(SectionType::Workout, "Workout", day_html)]
    } else {
        marked
    };

    sources
        .into_iter()
        .filter_map(|(section_type, label, html)| {
            let groups = build_exercise_groups(html);
            (!groups.is_empty()).then(|| WorkoutSectionSummary {
                section_type,
                label: label.to_string(),
                groups,
            })
        })
        .collect()
}

/// Parse preview HTML into the workout day at `day_index`.
///
/// HTML without any `day_content_N` block is parsed as a single day.
/// Returns `None` when no exercises could be found.
pub fn parse_workout_day_preview(html: &str, day_index: Option<usize>) -> Option<WorkoutDaySummary> {
    let blocks = extract_workout_day_blocks(html);

    let (index, label, day_html) = if blocks.is_empty() {
        (day_index, None, html)
    } else {
        let block = select_workout_day_block(&blocks, day_index)?;
        debug!(
            requested = ?day_index,
            selected = block.index,
            candidates = blocks.len(),
            "Selected preview day block"
        );
        let attrs = extract_data_attributes(block.open_tag);
        let label = DAY_LABEL_ATTRS.iter().find_map(|k| attr_text(&attrs, k));
        (Some(block.index), label, block.html)
    };

    let sections = build_sections(day_html);
    if sections.is_empty() {
        return None;
    }

    Some(WorkoutDaySummary::new(index, label, sections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BodyPartSets, GroupType};

    const FIXTURE: &str = include_str!("../tests/fixtures/workout-day-preview.html");

    fn row(name: &str, extra: &str) -> String {
        format!(r#"<tr data-exercise_name="{name}" {extra}><td>{name}</td></tr>"#)
    }

    fn names(group: &WorkoutExerciseGroup) -> Vec<&str> {
        group.exercises.iter().map(|e| e.name.as_str()).collect()
    }

    // ========== fixture tests ==========

    #[test]
    fn test_fixture_day_zero() {
        let day = parse_workout_day_preview(FIXTURE, Some(0)).unwrap();

        assert_eq!(day.day_index, Some(0));
        assert_eq!(
            day.total_volume_sets,
            vec![
                BodyPartSets {
                    body_part: "Upper Back".to_string(),
                    sets: 7.5
                },
                BodyPartSets {
                    body_part: "Biceps".to_string(),
                    sets: 3.0
                },
            ]
        );

        let labels: Vec<&str> = day.sections.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Warm Up", "Workout"]);

        let types: Vec<GroupType> = day.sections[1].groups.iter().map(|g| g.group_type).collect();
        assert_eq!(
            types,
            vec![GroupType::Straight, GroupType::Superset, GroupType::Superset]
        );
    }

    #[test]
    fn test_fixture_superset_members_in_document_order() {
        let day = parse_workout_day_preview(FIXTURE, Some(0)).unwrap();
        let groups = &day.sections[1].groups;
        assert_eq!(names(&groups[0]), vec!["Lat Pulldown"]);
        assert_eq!(names(&groups[1]), vec!["Seated Cable Row", "Face Pull"]);
        assert_eq!(names(&groups[2]), vec!["Incline Dumbbell Curl", "Hammer Curl"]);
    }

    #[test]
    fn test_fixture_exercise_fields() {
        let day = parse_workout_day_preview(FIXTURE, Some(0)).unwrap();
        let pulldown = &day.sections[1].groups[0].exercises[0];

        assert_eq!(pulldown.sets, Some(3.0));
        assert_eq!(pulldown.reps.as_deref(), Some("8-10"));
        assert_eq!(pulldown.rest_seconds, Some(90.0));
        assert_eq!(pulldown.sequence, Some(1.0));
        assert_eq!(pulldown.uuid.as_deref(), Some("ex-lat-pulldown"));
        assert_eq!(pulldown.notes.as_deref(), Some("Pause & squeeze"));
        assert_eq!(pulldown.media.as_ref().map(Vec::len), Some(1));
        assert_eq!(pulldown.body_parts.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_fixture_subrows_are_not_straight_sets() {
        let day = parse_workout_day_preview(FIXTURE, Some(0)).unwrap();
        assert!(day.exercises().all(|e| e.name != "Lat Pulldown (drop set)"));
    }

    #[test]
    fn test_fixture_second_day_by_index() {
        let day = parse_workout_day_preview(FIXTURE, Some(1)).unwrap();
        assert_eq!(day.day_index, Some(1));
        assert_eq!(day.day_label.as_deref(), Some("Legs"));
        assert_eq!(day.sections.len(), 1);
        assert_eq!(day.sections[0].label, "Workout");
    }

    #[test]
    fn test_fixture_without_index_uses_visible_block() {
        let day = parse_workout_day_preview(FIXTURE, None).unwrap();
        assert_eq!(day.day_index, Some(0));
    }

    // ========== build_exercise_groups tests ==========

    #[test]
    fn test_straight_rows_each_become_a_group() {
        let html = format!("<table>{}{}</table>", row("Squat", "data-sets=\"5\""), row("Lunge", ""));
        let groups = build_exercise_groups(&html);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.group_type == GroupType::Straight));
        assert_eq!(groups[0].exercises[0].sets, Some(5.0));
    }

    #[test]
    fn test_nested_superset_tables_count_once() {
        let html = format!(
            "<table><tr><th>Superset</th></tr><tr><td><table><tr><th>Superset</th></tr>{}</table></td></tr>{}</table>",
            row("A", ""),
            row("B", "")
        );
        let groups = build_exercise_groups(&html);
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0]), vec!["A", "B"]);
    }

    #[test]
    fn test_groups_sorted_by_position() {
        let html = format!(
            "<table><tr><th>SUPERSET</th></tr>{}{}</table><table>{}</table>",
            row("A", ""),
            row("B", ""),
            row("C", "")
        );
        let html = format!("<table>{}</table>{html}", row("First", ""));
        let groups = build_exercise_groups(&html);
        let kinds: Vec<GroupType> = groups.iter().map(|g| g.group_type).collect();
        assert_eq!(
            kinds,
            vec![GroupType::Straight, GroupType::Superset, GroupType::Straight]
        );
        assert_eq!(names(&groups[2]), vec!["C"]);
    }

    #[test]
    fn test_rows_without_name_are_skipped() {
        let html = r#"<table><tr data-sets="3"></tr><tr data-exercise_name="  "></tr></table>"#;
        assert!(build_exercise_groups(html).is_empty());
    }

    #[test]
    fn test_empty_superset_table_is_dropped() {
        let html = "<table><tr><td>Superset</td></tr></table>";
        assert!(build_exercise_groups(html).is_empty());
    }

    // ========== parse_workout_day_preview tests ==========

    #[test]
    fn test_preview_without_day_blocks() {
        let html = format!("<div class=\"preview_day_content\"><table>{}</table></div>", row("Press", ""));
        let day = parse_workout_day_preview(&html, Some(2)).unwrap();
        assert_eq!(day.day_index, Some(2));
        assert_eq!(day.day_label.as_deref(), Some("Day 3"));
        assert_eq!(day.sections[0].label, "Workout");
    }

    #[test]
    fn test_preview_sole_block_ignores_display() {
        let html = format!(
            r#"<div id="day_content_4" style="display:none"><table>{}</table></div>"#,
            row("Press", "")
        );
        let day = parse_workout_day_preview(&html, None).unwrap();
        assert_eq!(day.day_index, Some(4));
    }

    #[test]
    fn test_preview_empty_sections_yield_none() {
        let html = r#"<div id="day_content_0"><div class="workout_exercises"><p>Rest day</p></div></div>"#;
        assert!(parse_workout_day_preview(html, Some(0)).is_none());
        assert!(parse_workout_day_preview("", None).is_none());
    }

    #[test]
    fn test_preview_cooldown_tagged_as_workout() {
        let html = format!(
            r#"<div id="day_content_0"><div class="cooldown_exercises"><table>{}</table></div></div>"#,
            row("Stretch", "")
        );
        let day = parse_workout_day_preview(&html, Some(0)).unwrap();
        assert_eq!(day.sections.len(), 1);
        assert_eq!(day.sections[0].section_type, SectionType::Workout);
        assert_eq!(day.sections[0].label, "Cooldown");
    }
}
