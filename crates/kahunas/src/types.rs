use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Calendar event fields carried through to the output
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventInfo {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub id: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Program reference attached to an event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgramSummary {
    pub uuid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Sets performed per body part across a day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodyPartSets {
    pub body_part: String,
    pub sets: f64,
}

/// A body part trained by an exercise, with its per-set volume weight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodyPartVolume {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Demo video or image attached to an exercise
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseMedia {
    pub url: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkoutExerciseSummary {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Final 1-based position, assigned by the annotation pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Raw order hint as found in the source payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_on: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_parts: Option<Vec<BodyPartVolume>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<ExerciseMedia>>,
}

#[cfg(test)]
impl WorkoutExerciseSummary {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Straight,
    Superset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutExerciseGroup {
    #[serde(rename = "type")]
    pub group_type: GroupType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub exercises: Vec<WorkoutExerciseSummary>,
}

impl WorkoutExerciseGroup {
    /// Wrap a single exercise as its own straight set
    pub fn straight(exercise: WorkoutExerciseSummary) -> Self {
        Self {
            group_type: GroupType::Straight,
            label: None,
            exercises: vec![exercise],
        }
    }

    pub fn superset(label: Option<String>, exercises: Vec<WorkoutExerciseSummary>) -> Self {
        Self {
            group_type: GroupType::Superset,
            label,
            exercises,
        }
    }
}

/// Section tag. Cooldown sections are tagged `Workout` and told apart by label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    WarmUp,
    Workout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSectionSummary {
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub label: String,
    pub groups: Vec<WorkoutExerciseGroup>,
}

/// The three day phases in render order: (type, label)
pub const SECTION_KINDS: [(SectionType, &str); 3] = [
    (SectionType::WarmUp, "Warm Up"),
    (SectionType::Workout, "Workout"),
    (SectionType::Workout, "Cooldown"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkoutDaySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_label: Option<String>,

    #[serde(default)]
    pub total_volume_sets: Vec<BodyPartSets>,

    #[serde(default)]
    pub sections: Vec<WorkoutSectionSummary>,
}

impl WorkoutDaySummary {
    /// Build a day from its sections, deriving the volume totals and default label
    pub fn new(
        day_index: Option<usize>,
        day_label: Option<String>,
        sections: Vec<WorkoutSectionSummary>,
    ) -> Self {
        let day_label = day_label.or_else(|| day_index.map(|i| format!("Day {}", i + 1)));
        let total_volume_sets = total_volume_sets(&sections);
        Self {
            day_index,
            day_label,
            total_volume_sets,
            sections,
        }
    }

    #[cfg(test)]
    pub fn exercises(&self) -> impl Iterator<Item = &WorkoutExerciseSummary> {
        self.sections
            .iter()
            .flat_map(|s| s.groups.iter())
            .flat_map(|g| g.exercises.iter())
    }
}

/// Sum `sets * volume` per body part over the working sections, in first-seen order
fn total_volume_sets(sections: &[WorkoutSectionSummary]) -> Vec<BodyPartSets> {
    let mut totals: Vec<BodyPartSets> = Vec::new();

    let exercises = sections
        .iter()
        .filter(|s| s.section_type != SectionType::WarmUp)
        .flat_map(|s| s.groups.iter())
        .flat_map(|g| g.exercises.iter());

    for exercise in exercises {
        let (Some(sets), Some(parts)) = (exercise.sets, exercise.body_parts.as_ref()) else {
            continue;
        };
        for part in parts {
            let contribution = sets * part.volume.unwrap_or(1.0);
            match totals.iter_mut().find(|t| t.body_part == part.name) {
                Some(total) => total.sets += contribution,
                None => totals.push(BodyPartSets {
                    body_part: part.name.clone(),
                    sets: contribution,
                }),
            }
        }
    }

    totals
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutEventSummary {
    pub event: EventInfo,
    pub program: Option<ProgramSummary>,
    pub workout_day: Option<WorkoutDaySummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventFilters {
    pub program: Option<String>,
    pub workout: Option<String>,
}

/// Options supplied by the command layer to the formatter
#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    pub timezone: String,
    pub program: Option<String>,
    pub workout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEventsOutput {
    pub source: String,
    pub timezone: String,
    pub filters: EventFilters,
    pub events: Vec<WorkoutEventSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_exercise(name: &str, sets: Option<f64>, parts: &[(&str, Option<f64>)]) -> WorkoutExerciseSummary {
        WorkoutExerciseSummary {
            sets,
            body_parts: Some(
                parts
                    .iter()
                    .map(|(n, v)| BodyPartVolume {
                        name: n.to_string(),
                        volume: *v,
                    })
                    .collect(),
            ),
            ..WorkoutExerciseSummary::named(name)
        }
    }

    fn make_section(section_type: SectionType, label: &str, exercises: Vec<WorkoutExerciseSummary>) -> WorkoutSectionSummary {
        WorkoutSectionSummary {
            section_type,
            label: label.to_string(),
            groups: exercises.into_iter().map(WorkoutExerciseGroup::straight).collect(),
        }
    }

    // ========== WorkoutDaySummary tests ==========

    #[test]
    fn test_day_label_defaults_to_one_based() {
        let day = WorkoutDaySummary::new(Some(0), None, vec![]);
        assert_eq!(day.day_label.as_deref(), Some("Day 1"));

        let day = WorkoutDaySummary::new(Some(4), None, vec![]);
        assert_eq!(day.day_label.as_deref(), Some("Day 5"));
    }

    #[test]
    fn test_day_label_explicit_wins() {
        let day = WorkoutDaySummary::new(Some(0), Some("Pull".to_string()), vec![]);
        assert_eq!(day.day_label.as_deref(), Some("Pull"));
    }

    #[test]
    fn test_day_label_absent_without_index() {
        let day = WorkoutDaySummary::new(None, None, vec![]);
        assert!(day.day_label.is_none());
    }

    #[test]
    fn test_total_volume_accumulates_in_first_seen_order() {
        let sections = vec![make_section(
            SectionType::Workout,
            "Workout",
            vec![
                make_exercise("Row", Some(3.0), &[("Upper Back", Some(1.0))]),
                make_exercise("Curl", Some(3.0), &[("Biceps", None)]),
                make_exercise("Face Pull", Some(3.0), &[("Upper Back", Some(0.5))]),
            ],
        )];
        let day = WorkoutDaySummary::new(Some(0), None, sections);

        assert_eq!(
            day.total_volume_sets,
            vec![
                BodyPartSets {
                    body_part: "Upper Back".to_string(),
                    sets: 4.5
                },
                BodyPartSets {
                    body_part: "Biceps".to_string(),
                    sets: 3.0
                },
            ]
        );
    }

    #[test]
    fn test_total_volume_skips_warm_up_and_setless() {
        let sections = vec![
            make_section(
                SectionType::WarmUp,
                "Warm Up",
                vec![make_exercise("Band Pull", Some(2.0), &[("Rear Delts", None)])],
            ),
            make_section(
                SectionType::Workout,
                "Workout",
                vec![make_exercise("Plank", None, &[("Core", None)])],
            ),
        ];
        let day = WorkoutDaySummary::new(None, None, sections);
        assert!(day.total_volume_sets.is_empty());
    }

    // ========== serialization tests ==========

    #[test]
    fn test_exercise_serialization_omits_missing_fields() {
        let exercise = WorkoutExerciseSummary {
            sets: Some(0.0),
            ..WorkoutExerciseSummary::named("Deadlift")
        };
        let value = serde_json::to_value(&exercise).unwrap();
        assert_eq!(value, json!({"name": "Deadlift", "sets": 0.0}));
    }

    #[test]
    fn test_section_and_group_type_tags() {
        let section = WorkoutSectionSummary {
            section_type: SectionType::WarmUp,
            label: "Warm Up".to_string(),
            groups: vec![WorkoutExerciseGroup::superset(
                Some("Superset".to_string()),
                vec![WorkoutExerciseSummary::named("A")],
            )],
        };
        let value = serde_json::to_value(&section).unwrap();
        assert_eq!(value["type"], "warm_up");
        assert_eq!(value["groups"][0]["type"], "superset");
    }

    #[test]
    fn test_event_summary_null_program_and_day() {
        let summary = WorkoutEventSummary {
            event: EventInfo {
                id: json!(12),
                start: Some("2025-01-02".to_string()),
                end: None,
                title: None,
            },
            program: None,
            workout_day: None,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            value,
            json!({"event": {"id": 12, "start": "2025-01-02"}, "program": null, "workout_day": null})
        );
    }

    #[test]
    fn test_event_summary_roundtrip() {
        let summary = WorkoutEventSummary {
            event: EventInfo {
                id: json!("e1"),
                start: Some("2025-01-02T07:00:00".to_string()),
                end: Some("2025-01-02T08:00:00".to_string()),
                title: Some("Day 1".to_string()),
            },
            program: Some(ProgramSummary {
                uuid: "p1".to_string(),
                title: Some("Hypertrophy".to_string()),
            }),
            workout_day: Some(WorkoutDaySummary::new(
                Some(0),
                None,
                vec![make_section(
                    SectionType::Workout,
                    "Cooldown",
                    vec![WorkoutExerciseSummary::named("Stretch")],
                )],
            )),
        };

        let json = serde_json::to_string(&summary).unwrap();
        let back: WorkoutEventSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, back);
    }
}
