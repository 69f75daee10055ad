//! Shooting day models.

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run_of_day::{build_run_of_day, DayScheduleInput, DayScheduleOutput};

/// Unit name used when a build does not specify one.
pub const DEFAULT_UNIT: &str = "Main Unit";

/// Lifecycle status of a shooting day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayStatus {
    #[default]
    Scheduled,
    Confirmed,
    Wrapped,
    Cancelled,
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayStatus::Scheduled => "SCHEDULED",
            DayStatus::Confirmed => "CONFIRMED",
            DayStatus::Wrapped => "WRAPPED",
            DayStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "CONFIRMED" => DayStatus::Confirmed,
            "WRAPPED" => DayStatus::Wrapped,
            "CANCELLED" => DayStatus::Cancelled,
            _ => DayStatus::Scheduled,
        }
    }
}

/// A day to be created by a schedule build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShootingDay {
    pub project_id: String,
    pub date: NaiveDate,
    pub day_number: u32,
    pub unit: String,
    pub general_call: Option<String>,
    pub estimated_wrap: Option<String>,
    pub notes: Option<String>,
    /// Scene ids in shooting order; link `sort_order` is the index here.
    pub scene_ids: Vec<String>,
}

/// A persisted shooting day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootingDay {
    pub id: String,
    pub project_id: String,
    pub date: NaiveDate,
    /// Dense 1..N within one build batch.
    pub day_number: u32,
    pub unit: String,
    pub status: DayStatus,
    #[serde(default)]
    pub general_call: Option<String>,
    #[serde(default)]
    pub estimated_wrap: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub scene_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ShootingDay {
    /// Materialize a new day with a fresh id.
    pub fn from_new(day: NewShootingDay) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: day.project_id,
            date: day.date,
            day_number: day.day_number,
            unit: day.unit,
            status: DayStatus::Scheduled,
            general_call: day.general_call,
            estimated_wrap: day.estimated_wrap,
            notes: day.notes,
            scene_ids: day.scene_ids,
            created_at: Utc::now(),
        }
    }

    /// The run-of-day input derived from this day's stored fields.
    pub fn schedule_input(&self, template_id: Option<&str>) -> DayScheduleInput {
        DayScheduleInput {
            general_call: self.general_call.clone(),
            wrap_time: self.estimated_wrap.clone(),
            template_id: template_id.map(str::to_string),
            ..Default::default()
        }
    }

    /// Recompute this day's run-of-day.
    pub fn run_of_day(&self, template_id: Option<&str>) -> DayScheduleOutput {
        build_run_of_day(&self.schedule_input(template_id), self.scene_ids.len())
    }
}

/// A created day together with its computed run-of-day, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledDay {
    #[serde(flatten)]
    pub day: ShootingDay,
    pub run_of_day: DayScheduleOutput,
}

impl From<ShootingDay> for ScheduledDay {
    fn from(day: ShootingDay) -> Self {
        let run_of_day = day.run_of_day(None);
        Self { day, run_of_day }
    }
}
