//! Run-of-day computation for a single shooting day.
//!
//! [`build_run_of_day`] is a pure function: it expands a template against the
//! day's anchor times, merges caller-supplied items and reports whether the
//! meal break lands within six hours of crew call. It never fails; malformed
//! inputs fall back to template defaults.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clock::{format_clock, minutes_between, offset_clock, parse_clock};
use crate::templates::{template_or_default, ItemTone};

/// Crew call precedes general call by this much unless given explicitly.
pub const DEFAULT_CREW_CALL_LEAD_MINUTES: i64 = 30;

/// Meal lands this long after crew call unless given explicitly.
pub const DEFAULT_MEAL_AFTER_CREW_CALL_MINUTES: i64 = 6 * 60;

/// Longest compliant stretch from crew call to the first meal.
pub const MEAL_COMPLIANCE_WINDOW_MINUTES: u32 = 6 * 60;

/// Partial view of a shooting day used to compute its run-of-day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayScheduleInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_call: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crew_call: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_items: Vec<CustomScheduleItem>,
}

/// A caller-defined run-of-day entry at an absolute time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomScheduleItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: String,
    /// `HH:MM`
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub tone: Option<ItemTone>,
}

/// One computed entry of the run-of-day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScheduleItem {
    pub id: String,
    pub label: String,
    /// `HH:MM`
    pub time: String,
    pub detail: String,
    pub tone: ItemTone,
}

/// Computed run-of-day plus the meal compliance flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayScheduleOutput {
    pub items: Vec<ScheduleItem>,
    pub meal_within_six_hours: bool,
}

/// Resolved anchor times of a day, in minutes-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayAnchors {
    pub general_call: u32,
    pub crew_call: u32,
    pub lunch: u32,
    pub wrap: Option<u32>,
}

impl DayAnchors {
    /// Resolve anchors from the input, using `default_general_call` when the
    /// day has no valid general call.
    pub fn resolve(input: &DayScheduleInput, default_general_call: u32) -> Self {
        let general_call = clock_field(&input.general_call).unwrap_or(default_general_call);
        let crew_call = clock_field(&input.crew_call)
            .unwrap_or_else(|| offset_clock(general_call, -DEFAULT_CREW_CALL_LEAD_MINUTES));
        let lunch = clock_field(&input.lunch_time)
            .unwrap_or_else(|| offset_clock(crew_call, DEFAULT_MEAL_AFTER_CREW_CALL_MINUTES));

        Self {
            general_call,
            crew_call,
            lunch,
            wrap: clock_field(&input.wrap_time),
        }
    }

    /// True when the meal falls within six hours of crew call (inclusive).
    pub fn meal_within_six_hours(&self) -> bool {
        minutes_between(self.crew_call, self.lunch) <= MEAL_COMPLIANCE_WINDOW_MINUTES
    }
}

fn clock_field(value: &Option<String>) -> Option<u32> {
    value.as_deref().and_then(parse_clock)
}

/// Compute the run-of-day for a shooting day with `scene_count` scenes.
pub fn build_run_of_day(input: &DayScheduleInput, scene_count: usize) -> DayScheduleOutput {
    let template = template_or_default(input.template_id.as_deref());
    // Catalog defaults are validated by tests; 07:00 only guards a broken entry.
    let default_general_call = parse_clock(template.default_general_call).unwrap_or(7 * 60);
    let anchors = DayAnchors::resolve(input, default_general_call);

    let mut timed: Vec<(u32, ScheduleItem)> = template
        .items
        .iter()
        .filter(|item| item.min_scene_count.map_or(true, |min| scene_count >= min))
        .map(|item| {
            let minute = match (item.tone, anchors.wrap) {
                (ItemTone::Wrap, Some(wrap)) => wrap,
                _ => offset_clock(anchors.general_call, item.offset_minutes),
            };
            let entry = ScheduleItem {
                id: item.id.to_string(),
                label: item.label.to_string(),
                time: format_clock(minute),
                detail: item.detail.to_string(),
                tone: item.tone,
            };
            (minute, entry)
        })
        .collect();

    timed.extend(
        input
            .custom_items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| accept_custom_item(index, item)),
    );

    // Stable: ties keep template-then-custom insertion order.
    timed.sort_by_key(|(minute, _)| *minute);

    DayScheduleOutput {
        items: timed.into_iter().map(|(_, item)| item).collect(),
        meal_within_six_hours: anchors.meal_within_six_hours(),
    }
}

/// Validate a custom item; invalid items are dropped without error.
fn accept_custom_item(index: usize, item: &CustomScheduleItem) -> Option<(u32, ScheduleItem)> {
    let minute = parse_clock(&item.time)?;
    let label = item.label.trim();
    let detail = item.detail.trim();
    if label.is_empty() || detail.is_empty() {
        return None;
    }

    let id = item
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("custom-{}", index + 1));

    Some((
        minute,
        ScheduleItem {
            id,
            label: label.to_string(),
            time: format_clock(minute),
            detail: detail.to_string(),
            tone: item.tone.unwrap_or_default(),
        },
    ))
}
