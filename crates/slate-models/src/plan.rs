//! Schedule build request/response and AI day-plan models.
//!
//! The AI day-plan is untrusted input: [`SchedulePlan::from_value`] validates
//! its shape and drops entries that cannot be used, while the top-level
//! `days` array being absent is fatal.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use crate::clock::normalize_clock;
use crate::shooting_day::ScheduledDay;

/// Default cap on scenes per shooting day.
pub const DEFAULT_MAX_SCENES_PER_DAY: u32 = 8;

fn default_max_scenes_per_day() -> u32 {
    DEFAULT_MAX_SCENES_PER_DAY
}

/// Request to build a shooting schedule for a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BuildScheduleRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "projectId is required"))]
    pub project_id: String,
    #[serde(default)]
    pub replace_existing: bool,
    #[serde(default = "default_max_scenes_per_day")]
    #[validate(range(min = 1, max = 50, message = "maxScenesPerDay must be between 1 and 50"))]
    pub max_scenes_per_day: u32,
    /// Defaults to tomorrow.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// Counters describing the outcome of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub days_created: usize,
    pub scenes_assigned: usize,
    pub scenes_unscheduled: usize,
}

/// Result of a schedule build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBuildResult {
    pub shooting_days: Vec<ScheduledDay>,
    pub assumptions: Vec<String>,
    pub stats: BuildStats,
}

/// One planned shooting day as proposed by the AI planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScenePlanEntry {
    /// Days after the schedule start date.
    pub date_offset: i64,
    pub general_call: Option<String>,
    pub estimated_wrap: Option<String>,
    pub scene_ids: Vec<String>,
    pub notes: Option<String>,
}

/// The AI planner's full answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePlan {
    pub days: Vec<ScenePlanEntry>,
    #[serde(default)]
    pub unscheduled_scene_ids: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// Errors validating an AI day-plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("AI response is not a JSON object")]
    NotAnObject,

    #[error("AI response is missing a \"days\" array")]
    MissingDays,
}

impl SchedulePlan {
    /// Validate a parsed JSON value into a plan.
    ///
    /// Fails only when the value is not an object or `days` is not an array.
    /// Individual day entries that are not objects are dropped; an entry
    /// without a numeric `dateOffset` uses its position in the array.
    pub fn from_value(value: &Value) -> Result<Self, PlanError> {
        let object = value.as_object().ok_or(PlanError::NotAnObject)?;
        let days = object
            .get("days")
            .and_then(Value::as_array)
            .ok_or(PlanError::MissingDays)?;

        let days = days
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| ScenePlanEntry::from_value(index, entry))
            .collect();

        Ok(Self {
            days,
            unscheduled_scene_ids: string_list(object.get("unscheduledSceneIds")),
            assumptions: string_list(object.get("assumptions")),
        })
    }
}

impl ScenePlanEntry {
    fn from_value(index: usize, value: &Value) -> Option<Self> {
        let entry = value.as_object()?;

        let date_offset = entry
            .get("dateOffset")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.trunc() as i64)))
            .unwrap_or(index as i64);

        Some(Self {
            date_offset,
            general_call: clock_string(entry.get("generalCall")),
            estimated_wrap: clock_string(entry.get("estimatedWrap")),
            scene_ids: string_list(entry.get("sceneIds")),
            notes: entry
                .get("notes")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

fn clock_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).and_then(normalize_clock)
}

/// Read a list of strings leniently: a lone string becomes a one-item list,
/// numbers are stringified, anything else is skipped.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let scalar = |v: &Value| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        Some(other) => scalar(other).into_iter().collect(),
        None => Vec::new(),
    }
}
