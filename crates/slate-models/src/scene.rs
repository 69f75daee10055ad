//! Scene and project models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Production status of a scene.
///
/// Variants are ordered by progress; status only ever moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneStatus {
    #[default]
    Unscheduled,
    Scheduled,
    PartiallyShot,
    Shot,
}

impl SceneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneStatus::Unscheduled => "UNSCHEDULED",
            SceneStatus::Scheduled => "SCHEDULED",
            SceneStatus::PartiallyShot => "PARTIALLY_SHOT",
            SceneStatus::Shot => "SHOT",
        }
    }

    /// Parse a stored status, treating unknown values as unscheduled.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SCHEDULED" => SceneStatus::Scheduled,
            "PARTIALLY_SHOT" => SceneStatus::PartiallyShot,
            "SHOT" => SceneStatus::Shot,
            _ => SceneStatus::Unscheduled,
        }
    }

    /// True if moving to `next` would not regress the scene.
    pub fn can_advance_to(&self, next: SceneStatus) -> bool {
        *self < next
    }
}

/// A breakdown scene belonging to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub scene_number: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    /// `INT`, `EXT` or `INT/EXT`
    #[serde(default)]
    pub int_ext: Option<String>,
    /// `DAY`, `NIGHT`, ...
    #[serde(default)]
    pub day_night: Option<String>,
    /// Length in pages; eighths are fractional (1 3/8 = 1.375).
    #[serde(default)]
    pub page_count: Option<f64>,
    /// Script page the scene starts on, when known.
    #[serde(default)]
    pub page_start: Option<f64>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub status: SceneStatus,
}

impl Scene {
    /// Create an unscheduled scene with only identity fields set.
    pub fn new(id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            scene_number: None,
            synopsis: None,
            int_ext: None,
            day_night: None,
            page_count: None,
            page_start: None,
            sort_order: 0,
            location_name: None,
            status: SceneStatus::Unscheduled,
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.scene_number = Some(number.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location_name = Some(location.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_page_count(mut self, pages: f64) -> Self {
        self.page_count = Some(pages);
        self
    }
}

/// Format a page length in screenplay eighths, e.g. `1 3/8`.
pub fn format_page_eighths(pages: f64) -> String {
    if !pages.is_finite() || pages <= 0.0 {
        return "0".to_string();
    }

    let eighths = (pages * 8.0).round() as u64;
    let whole = eighths / 8;
    let rest = eighths % 8;

    match (whole, rest) {
        (0, 0) => "0".to_string(),
        (w, 0) => w.to_string(),
        (0, r) => format!("{}/8", r),
        (w, r) => format!("{} {}/8", w, r),
    }
}

/// A production the caller may schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

impl Project {
    /// True if the user owns or is a member of the project.
    pub fn is_accessible_by(&self, uid: &str) -> bool {
        self.owner_id == uid || self.member_ids.iter().any(|m| m == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_advances() {
        assert!(SceneStatus::Unscheduled.can_advance_to(SceneStatus::Scheduled));
        assert!(!SceneStatus::Scheduled.can_advance_to(SceneStatus::Scheduled));
        assert!(!SceneStatus::Shot.can_advance_to(SceneStatus::Scheduled));
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            SceneStatus::Unscheduled,
            SceneStatus::Scheduled,
            SceneStatus::PartiallyShot,
            SceneStatus::Shot,
        ] {
            assert_eq!(SceneStatus::from_str_or_default(status.as_str()), status);
        }
        assert_eq!(SceneStatus::from_str_or_default("bogus"), SceneStatus::Unscheduled);
    }

    #[test]
    fn test_format_page_eighths() {
        assert_eq!(format_page_eighths(1.375), "1 3/8");
        assert_eq!(format_page_eighths(0.125), "1/8");
        assert_eq!(format_page_eighths(2.0), "2");
        assert_eq!(format_page_eighths(0.0), "0");
        assert_eq!(format_page_eighths(f64::NAN), "0");
    }

    #[test]
    fn test_project_access() {
        let project = Project {
            id: "p1".into(),
            name: "Feature".into(),
            owner_id: "owner".into(),
            member_ids: vec!["ad".into()],
        };
        assert!(project.is_accessible_by("owner"));
        assert!(project.is_accessible_by("ad"));
        assert!(!project.is_accessible_by("stranger"));
    }
}
