//! Business logic services.

pub mod gemini;
pub mod json_extract;
pub mod planner;
pub mod schedule_builder;
pub mod schedule_prompt;
pub mod schedule_view;

pub use gemini::{GeminiConfig, GeminiPlanner};
pub use json_extract::{extract_json, ExtractError};
pub use planner::{PlannerConfig, PlannerError, PlannerRequest, SchedulePlanner};
pub use schedule_builder::{
    parse_plan, BuildError, BuilderConfig, PlanParseError, ScheduleBuilder, ScheduleStores,
    SCHEDULE_BUILD_ENDPOINT, SCHEDULE_VIEW_ENDPOINT,
};
pub use schedule_view::{ProjectSchedule, ScheduleViewService};
