//! Shared data models for the Slate scheduling backend.
//!
//! This crate provides:
//! - Serde models for projects, scenes, shooting days and AI day-plans
//! - The run-of-day template engine (pure, deterministic)
//! - Scene ordering and de-duplication for extracted scene lists
//! - Content-addressed cache keys
//! - Store traits implemented by persistence backends

pub mod cache_key;
pub mod clock;
pub mod plan;
pub mod run_of_day;
pub mod scene;
pub mod scene_order;
pub mod shooting_day;
pub mod store;
pub mod templates;

// Re-export common types
pub use cache_key::{build_key, CacheEntry, DEFAULT_CACHE_TTL_SECS, MAX_CACHE_TTL_SECS};
pub use plan::{
    BuildScheduleRequest, BuildStats, PlanError, ScenePlanEntry, ScheduleBuildResult, SchedulePlan,
    DEFAULT_MAX_SCENES_PER_DAY,
};
pub use run_of_day::{build_run_of_day, CustomScheduleItem, DayScheduleInput, DayScheduleOutput, ScheduleItem};
pub use scene::{format_page_eighths, Project, Scene, SceneStatus};
pub use scene_order::{
    adjust_chunk_local_page, dedupe_by_scene_number_and_set, reconcile_extracted_scenes,
    sort_by_script_page_order, ExtractedChunk, ExtractedScene,
};
pub use shooting_day::{DayStatus, NewShootingDay, ScheduledDay, ShootingDay, DEFAULT_UNIT};
pub use store::{
    DayStore, DeletedCounts, ProjectStore, ResponseCache, SceneStore, StoreError, StoreResult,
};
pub use templates::{all_templates, template_or_default, ItemTone, ScheduleTemplate, TemplateItem};
