//! Ordering and de-duplication of loosely extracted scene lists.
//!
//! Scene lists coming out of chunked script extraction are noisy: page numbers
//! restart inside chunks, the same scene is reported by overlapping chunks and
//! some scenes have no page at all. These helpers clean such lists before the
//! data is trusted.

use std::cmp::Ordering;
use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Chunk-local page numbers above this are taken at face value.
const MAX_CHUNK_LOCAL_PAGE: f64 = 15.0;

fn valid_page(page: Option<f64>) -> Option<f64> {
    page.filter(|p| p.is_finite() && *p > 0.0)
}

/// Stable sort by script page.
///
/// Items with a valid page (finite and positive) come first in ascending page
/// order; items without one follow, keeping their original relative order.
pub fn sort_by_script_page_order<T, F>(items: Vec<T>, page_of: F) -> Vec<T>
where
    F: Fn(&T) -> Option<f64>,
{
    let mut keyed: Vec<(Option<f64>, T)> = items
        .into_iter()
        .map(|item| (valid_page(page_of(&item)), item))
        .collect();

    // sort_by is stable, so equal pages keep their original index order.
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Remap a page number that restarted at 1 inside an extraction chunk.
///
/// When the chunk starts after page 1 and the raw page is both smaller than
/// the chunk start and small enough to be chunk-local, it is shifted to
/// `chunk_page_start - 1 + raw_page`. Non-finite or non-positive pages become
/// `None`.
pub fn adjust_chunk_local_page(raw_page: Option<f64>, chunk_page_start: Option<f64>) -> Option<f64> {
    let raw = valid_page(raw_page)?;

    match valid_page(chunk_page_start) {
        Some(start) if start > 1.0 && raw < start && raw <= MAX_CHUNK_LOCAL_PAGE => {
            Some(start - 1.0 + raw)
        }
        _ => Some(raw),
    }
}

/// Normalize a scene number or set name for duplicate detection.
///
/// Trims, strips a leading `SCENE ` (any case) and upper-cases.
pub fn normalize_scene_token(value: &str) -> String {
    let trimmed = value.trim();
    let stripped = match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("scene ") => &trimmed[6..],
        _ => trimmed,
    };
    stripped.trim().to_uppercase()
}

/// Drop later duplicates sharing a scene number and set name.
///
/// The first occurrence wins. Items without a scene number are always kept,
/// since collapsing unnumbered scenes could silently lose real content.
pub fn dedupe_by_scene_number_and_set<T, N, S>(items: Vec<T>, scene_number_of: N, set_name_of: S) -> Vec<T>
where
    N: Fn(&T) -> Option<&str>,
    S: Fn(&T) -> Option<&str>,
{
    let mut seen = HashSet::new();

    items
        .into_iter()
        .filter(|item| {
            let number = normalize_scene_token(scene_number_of(item).unwrap_or_default());
            if number.is_empty() {
                return true;
            }
            let set = normalize_scene_token(set_name_of(item).unwrap_or_default());
            seen.insert(format!("{}::{}", number, set))
        })
        .collect()
}

/// A scene as reported by script extraction, before reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedScene {
    #[serde(default)]
    pub scene_number: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub page: Option<f64>,
    #[serde(default)]
    pub synopsis: Option<String>,
}

/// One extraction chunk and the script page it started on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedChunk {
    #[serde(default)]
    pub page_start: Option<f64>,
    #[serde(default)]
    pub scenes: Vec<ExtractedScene>,
}

/// Reconcile chunked extraction output into one clean, page-ordered list.
///
/// Pages are corrected per chunk first, then the list is sorted and
/// de-duplicated so the earliest-page occurrence of a scene is kept.
pub fn reconcile_extracted_scenes(chunks: Vec<ExtractedChunk>) -> Vec<ExtractedScene> {
    let flattened: Vec<ExtractedScene> = chunks
        .into_iter()
        .flat_map(|chunk| {
            let start = chunk.page_start;
            chunk.scenes.into_iter().map(move |mut scene| {
                scene.page = adjust_chunk_local_page(scene.page, start);
                scene
            })
        })
        .collect();

    let ordered = sort_by_script_page_order(flattened, |s| s.page);
    dedupe_by_scene_number_and_set(ordered, |s| s.scene_number.as_deref(), |s| s.set_name.as_deref())
}
