//! Prompt construction for the schedule planner.

use chrono::NaiveDate;

use slate_models::{format_page_eighths, sort_by_script_page_order, Scene};

/// Synopsis characters kept per manifest line.
const MAX_SYNOPSIS_CHARS: usize = 160;

pub const SYSTEM_PROMPT: &str = "You are a first assistant director building a film shooting schedule. \
Group scenes into shooting days to minimise company moves: keep scenes at the same location together, \
keep DAY and NIGHT work on separate days where possible, and balance page counts across days. \
Only use scene IDs from the manifest. Respond with a single JSON object and nothing else.";

/// Scenes in manifest order: stored sort order, then script page where known.
pub fn manifest_order(scenes: &[Scene]) -> Vec<&Scene> {
    let mut by_sort_order: Vec<&Scene> = scenes.iter().collect();
    by_sort_order.sort_by_key(|s| s.sort_order);
    sort_by_script_page_order(by_sort_order, |s| s.page_start)
}

/// One compact line describing a scene:
/// `ID | Scene 12A | INT Diner - NIGHT | 1 3/8 pages | synopsis`.
pub fn manifest_line(scene: &Scene) -> String {
    let number = scene.scene_number.as_deref().unwrap_or("?");

    let mut heading = String::new();
    if let Some(int_ext) = &scene.int_ext {
        heading.push_str(int_ext);
        heading.push(' ');
    }
    heading.push_str(scene.location_name.as_deref().unwrap_or("Unknown location"));
    if let Some(day_night) = &scene.day_night {
        heading.push_str(" - ");
        heading.push_str(day_night);
    }

    let pages = match scene.page_count {
        Some(p) if p.is_finite() && p > 0.0 => format_page_eighths(p),
        _ => "?".to_string(),
    };

    let synopsis: String = scene
        .synopsis
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_SYNOPSIS_CHARS)
        .collect();

    format!("{} | Scene {} | {} | {} pages | {}", scene.id, number, heading, pages, synopsis)
        .trim_end()
        .to_string()
}

pub fn scene_manifest(scenes: &[Scene]) -> Vec<String> {
    manifest_order(scenes).into_iter().map(manifest_line).collect()
}

/// User prompt carrying the manifest and the expected answer shape.
pub fn user_prompt(start_date: NaiveDate, max_scenes_per_day: u32, manifest: &[String]) -> String {
    format!(
        r#"Build a shooting schedule starting on {start} (dateOffset 0).
Put at most {max} scenes on any day. Days may skip dates (weekends, travel).

SCENES ({count}):
{scenes}

Return ONLY this JSON shape:
{{
  "days": [
    {{
      "dateOffset": 0,
      "generalCall": "HH:MM",
      "estimatedWrap": "HH:MM",
      "sceneIds": ["<scene id>"],
      "notes": "short reasoning for the day"
    }}
  ],
  "unscheduledSceneIds": ["<scene id>"],
  "assumptions": ["<assumption>"]
}}"#,
        start = start_date.format("%Y-%m-%d"),
        max = max_scenes_per_day,
        count = manifest.len(),
        scenes = manifest.join("\n"),
    )
}
