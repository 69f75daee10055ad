//! Built-in daily film schedule templates.
//!
//! Templates are code-defined reference data. Item offsets are signed
//! minutes relative to the general call of the day.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Visual/semantic tone of a run-of-day item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemTone {
    #[default]
    Default,
    Accent,
    Break,
    Wrap,
}

/// One planned event of a template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateItem {
    pub id: &'static str,
    pub label: &'static str,
    /// Minutes relative to general call (negative = before).
    pub offset_minutes: i64,
    pub detail: &'static str,
    pub tone: ItemTone,
    /// Item only applies when the day carries at least this many scenes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_scene_count: Option<usize>,
}

/// A named run-of-day template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTemplate {
    pub id: &'static str,
    pub name: &'static str,
    /// General call used when the day does not specify one (`HH:MM`).
    pub default_general_call: &'static str,
    pub items: &'static [TemplateItem],
}

/// Template used when no template id is given or the id is unknown.
pub const DEFAULT_TEMPLATE_ID: &str = "standard-12";

const fn item(
    id: &'static str,
    label: &'static str,
    offset_minutes: i64,
    detail: &'static str,
    tone: ItemTone,
) -> TemplateItem {
    TemplateItem {
        id,
        label,
        offset_minutes,
        detail,
        tone,
        min_scene_count: None,
    }
}

const fn company_move(offset_minutes: i64) -> TemplateItem {
    TemplateItem {
        id: "company-move",
        label: "Company Move",
        offset_minutes,
        detail: "Relocate cast, crew and gear to the next set",
        tone: ItemTone::Default,
        min_scene_count: Some(4),
    }
}

static STANDARD_12: [TemplateItem; 8] = [
    item("crew-call", "Crew Call", -30, "Crew reports, breakfast on set", ItemTone::Accent),
    item("general-call", "General Call", 0, "Cast and shooting crew on set", ItemTone::Accent),
    item("blocking", "Blocking & Rehearsal", 15, "Director and cast block the first setup", ItemTone::Default),
    item("first-shot", "First Shot", 60, "Camera rolls on the first setup", ItemTone::Accent),
    company_move(240),
    item("meal", "Meal Break", 330, "30-minute meal, off the clock", ItemTone::Break),
    item("after-meal", "First Shot After Meal", 390, "Back on the clock", ItemTone::Default),
    item("wrap", "Camera Wrap", 720, "Picture wrap, begin company wrap", ItemTone::Wrap),
];

static COMMERCIAL_10: [TemplateItem; 6] = [
    item("crew-call", "Crew Call", -30, "Crew reports, load in", ItemTone::Accent),
    item("general-call", "General Call", 0, "Talent and agency on set", ItemTone::Accent),
    item("first-shot", "First Shot", 45, "Camera rolls on the hero setup", ItemTone::Accent),
    company_move(210),
    item("meal", "Meal Break", 330, "30-minute meal", ItemTone::Break),
    item("wrap", "Camera Wrap", 600, "Picture wrap, load out", ItemTone::Wrap),
];

static NIGHT_12: [TemplateItem; 7] = [
    item("crew-call", "Crew Call", -30, "Crew reports, lighting pre-rig", ItemTone::Accent),
    item("general-call", "General Call", 0, "Cast and shooting crew on set", ItemTone::Accent),
    item("first-shot", "First Shot", 60, "Camera rolls once it is dark", ItemTone::Accent),
    company_move(270),
    item("meal", "Meal Break", 330, "30-minute meal, off the clock", ItemTone::Break),
    item("last-looks", "Last Setup Before Dawn", 630, "Final setup before sunrise", ItemTone::Default),
    item("wrap", "Camera Wrap", 720, "Picture wrap, begin company wrap", ItemTone::Wrap),
];

static TEMPLATES: [ScheduleTemplate; 3] = [
    ScheduleTemplate {
        id: "standard-12",
        name: "Standard 12-Hour",
        default_general_call: "07:00",
        items: &STANDARD_12,
    },
    ScheduleTemplate {
        id: "commercial-10",
        name: "Commercial 10-Hour",
        default_general_call: "08:00",
        items: &COMMERCIAL_10,
    },
    ScheduleTemplate {
        id: "night-12",
        name: "Night Shoot 12-Hour",
        default_general_call: "18:30",
        items: &NIGHT_12,
    },
];

/// All built-in templates, in catalog order.
pub fn all_templates() -> &'static [ScheduleTemplate] {
    &TEMPLATES
}

/// Look up a template, falling back to the default for unknown ids.
pub fn template_or_default(template_id: Option<&str>) -> &'static ScheduleTemplate {
    template_id
        .and_then(|id| TEMPLATES.iter().find(|t| t.id == id.trim()))
        .unwrap_or_else(default_template)
}

/// The default template.
pub fn default_template() -> &'static ScheduleTemplate {
    TEMPLATES
        .iter()
        .find(|t| t.id == DEFAULT_TEMPLATE_ID)
        .unwrap_or(&TEMPLATES[0])
}
