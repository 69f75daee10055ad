//! Schedule build orchestration.
//!
//! A build walks `Validating -> FetchingScenes -> PromptingAi -> Parsing ->
//! Reconciling -> Persisting -> Done`, failing from any step:
//!
//! 1. Check the request and the caller's access to the project.
//! 2. Load the project's scenes and render them as a manifest.
//! 3. Look the plan up in the AI cache, or ask the planner and cache the
//!    validated answer.
//! 4. Keep only scene ids that belong to the project.
//! 5. Optionally reset the existing schedule, then create one day per plan
//!    entry. A day that fails to persist is logged and skipped.
//!
//! Builds for the same project are serialized within this process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{Days, NaiveDate, TimeDelta, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::Instrument;
use validator::{Validate, ValidationErrors};

use slate_models::{
    build_key, BuildScheduleRequest, BuildStats, CacheEntry, DayStore, NewShootingDay, PlanError,
    ProjectStore, ResponseCache, Scene, SceneStatus, SceneStore, ScheduleBuildResult, ScheduledDay,
    SchedulePlan, ShootingDay, StoreError, DEFAULT_UNIT,
};

use super::json_extract::{extract_json, ExtractError};
use super::planner::{PlannerConfig, PlannerError, PlannerRequest, SchedulePlanner};
use super::schedule_prompt::{scene_manifest, user_prompt, SYSTEM_PROMPT};
use crate::logging::{BuildLogger, BuildPhase};
use crate::metrics;

/// Cache endpoint for planner answers.
pub const SCHEDULE_BUILD_ENDPOINT: &str = "schedule-build";

/// Cache endpoint for rendered project schedules; cleared by every build.
pub const SCHEDULE_VIEW_ENDPOINT: &str = "schedule-view";

/// The planner's text could not be turned into a plan.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Extract and validate a day-plan from raw planner output.
pub fn parse_plan(text: &str) -> Result<(Value, SchedulePlan), PlanParseError> {
    let value = extract_json(text)?;
    let plan = SchedulePlan::from_value(&value)?;
    Ok((value, plan))
}

/// Errors that end a build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BuildError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::Validation(_) => "validation",
            BuildError::NotFound(_) => "not_found",
            BuildError::Upstream(_) => "upstream",
            BuildError::Store(_) => "store",
        }
    }
}

impl From<PlannerError> for BuildError {
    fn from(e: PlannerError) -> Self {
        BuildError::Upstream(format!("AI planner failed: {}", e))
    }
}

impl From<PlanParseError> for BuildError {
    fn from(e: PlanParseError) -> Self {
        BuildError::Upstream(format!("Could not read the AI schedule: {}", e))
    }
}

impl From<ValidationErrors> for BuildError {
    fn from(errors: ValidationErrors) -> Self {
        BuildError::Validation(validation_message(&errors))
    }
}

/// First human-readable message of a validation failure.
pub fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .min()
        .unwrap_or_else(|| "Invalid request".to_string())
}

/// Collaborators a build reads from and writes to.
#[derive(Clone)]
pub struct ScheduleStores {
    pub projects: Arc<dyn ProjectStore>,
    pub scenes: Arc<dyn SceneStore>,
    pub days: Arc<dyn DayStore>,
    pub cache: Arc<dyn ResponseCache>,
}

/// Tunables of the builder.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub cache_ttl_secs: u64,
}

impl BuilderConfig {
    pub fn new(planner: &PlannerConfig, cache_ttl_secs: u64) -> Self {
        Self {
            max_tokens: planner.max_tokens,
            temperature: planner.temperature,
            cache_ttl_secs,
        }
    }
}

/// Where the plan of a build came from.
struct PlanSource {
    plan: SchedulePlan,
    cache_hit: bool,
}

/// Builds shooting schedules from a project's scenes.
pub struct ScheduleBuilder {
    stores: ScheduleStores,
    planner: Arc<dyn SchedulePlanner>,
    config: BuilderConfig,
    locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl ScheduleBuilder {
    pub fn new(stores: ScheduleStores, planner: Arc<dyn SchedulePlanner>, config: BuilderConfig) -> Self {
        Self {
            stores,
            planner,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build a schedule for `request.project_id` on behalf of `uid`.
    pub async fn build(&self, request: BuildScheduleRequest, uid: &str) -> Result<ScheduleBuildResult, BuildError> {
        let mut logger = BuildLogger::new(&request.project_id);
        let span = logger.create_span();

        let mut cache_hit = false;
        let result = self
            .run(&request, uid, &mut logger, &mut cache_hit)
            .instrument(span)
            .await;

        let elapsed_secs = logger.elapsed_ms() as f64 / 1000.0;
        match &result {
            Ok(built) => {
                logger.log_completion(&built.stats, cache_hit);
                metrics::record_schedule_build("success", cache_hit, elapsed_secs);
            }
            Err(e) => {
                logger.log_failure(e);
                metrics::record_schedule_build(e.kind(), cache_hit, elapsed_secs);
            }
        }
        result
    }

    async fn run(
        &self,
        request: &BuildScheduleRequest,
        uid: &str,
        logger: &mut BuildLogger,
        cache_hit: &mut bool,
    ) -> Result<ScheduleBuildResult, BuildError> {
        logger.log_start(&format!(
            "replace_existing={} max_scenes_per_day={}",
            request.replace_existing, request.max_scenes_per_day
        ));

        request.validate()?;
        let project_id = request.project_id.as_str();
        self.stores
            .projects
            .find_accessible(project_id, uid)
            .await?
            .ok_or_else(|| BuildError::NotFound("Project not found".to_string()))?;

        let lock = self.project_lock(project_id);
        let _guard = lock.lock().await;

        logger.enter(BuildPhase::FetchingScenes);
        let scenes = self.stores.scenes.list_for_project(project_id).await?;
        if scenes.is_empty() {
            return Err(BuildError::Validation(
                "Project has no scenes to schedule".to_string(),
            ));
        }
        logger.log_progress(&format!("loaded {} scenes", scenes.len()));

        logger.enter(BuildPhase::PromptingAi);
        let start_date = request.start_date.unwrap_or_else(tomorrow);
        let source = self
            .obtain_plan(request, start_date, &scenes, uid, logger)
            .await?;
        *cache_hit = source.cache_hit;

        logger.enter(BuildPhase::Reconciling);
        let known: HashSet<&str> = scenes.iter().map(|s| s.id.as_str()).collect();
        let planned = reconcile_plan(
            &source.plan,
            project_id,
            start_date,
            &known,
            request.max_scenes_per_day,
            logger,
        );

        logger.enter(BuildPhase::Persisting);
        let mut removed_days = 0;
        if request.replace_existing {
            let deleted = self.stores.days.delete_project_schedule(project_id).await?;
            removed_days = deleted.days;
            logger.log_progress(&format!(
                "removed previous schedule ({} days, {} rows total)",
                deleted.days,
                deleted.total()
            ));
        }

        let planned_days = planned.len();
        let created = self.persist_days(project_id, start_date, planned, &scenes, logger).await;
        if removed_days > 0 && created.is_empty() {
            logger.log_error(&format!(
                "previous schedule of {} days was removed and none of the {} planned days were created",
                removed_days, planned_days
            ));
        }
        let stats = compute_stats(&created, &scenes);

        self.stores
            .cache
            .invalidate_project(SCHEDULE_VIEW_ENDPOINT, project_id)
            .await;

        Ok(ScheduleBuildResult {
            shooting_days: created.into_iter().map(ScheduledDay::from).collect(),
            assumptions: source.plan.assumptions,
            stats,
        })
    }

    /// Cached plan if present and usable, otherwise a fresh planner answer.
    async fn obtain_plan(
        &self,
        request: &BuildScheduleRequest,
        start_date: NaiveDate,
        scenes: &[Scene],
        uid: &str,
        logger: &mut BuildLogger,
    ) -> Result<PlanSource, BuildError> {
        let manifest = scene_manifest(scenes);
        let cache_key = build_key(&json!({
            "scope": request.project_id,
            "startDate": start_date,
            "maxScenesPerDay": request.max_scenes_per_day,
            "sceneList": manifest,
        }));

        if let Some(cached) = self.stores.cache.get(SCHEDULE_BUILD_ENDPOINT, &cache_key).await {
            match SchedulePlan::from_value(&cached) {
                Ok(plan) => {
                    logger.log_progress("using cached plan");
                    return Ok(PlanSource { plan, cache_hit: true });
                }
                Err(e) => logger.log_warning(&format!("ignoring unusable cached plan: {}", e)),
            }
        }

        let text = self
            .planner
            .plan(PlannerRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                user_prompt: user_prompt(start_date, request.max_scenes_per_day, &manifest),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            })
            .await?;

        logger.enter(BuildPhase::Parsing);
        let (value, plan) = parse_plan(&text)?;
        logger.log_progress(&format!("planner proposed {} days", plan.days.len()));

        self.stores
            .cache
            .set(CacheEntry::new(
                SCHEDULE_BUILD_ENDPOINT,
                cache_key,
                value,
                self.config.cache_ttl_secs,
                Some(request.project_id.clone()),
                uid,
            ))
            .await;

        Ok(PlanSource { plan, cache_hit: false })
    }

    /// Create days in plan order. Failures are logged and skipped.
    async fn persist_days(
        &self,
        project_id: &str,
        start_date: NaiveDate,
        planned: Vec<NewShootingDay>,
        scenes: &[Scene],
        logger: &BuildLogger,
    ) -> Vec<ShootingDay> {
        let statuses: HashMap<&str, SceneStatus> =
            scenes.iter().map(|s| (s.id.as_str(), s.status)).collect();
        let mut created = Vec::with_capacity(planned.len());

        for new_day in planned {
            let day_number = new_day.day_number;
            let day = match self.stores.days.create_day(new_day).await {
                Ok(day) => day,
                Err(e) => {
                    logger.log_warning(&format!("skipping day {}: {}", day_number, e));
                    metrics::record_day_skipped();
                    continue;
                }
            };

            let to_mark: Vec<String> = day
                .scene_ids
                .iter()
                .filter(|id| {
                    statuses
                        .get(id.as_str())
                        .is_some_and(|s| s.can_advance_to(SceneStatus::Scheduled))
                })
                .cloned()
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            if !to_mark.is_empty() {
                if let Err(e) = self.stores.scenes.mark_scheduled(project_id, &to_mark).await {
                    logger.log_warning(&format!(
                        "day {} created but scene statuses not updated: {}",
                        day.day_number, e
                    ));
                }
            }

            created.push(day);
        }

        logger.log_progress(&format!(
            "created {} days starting {}",
            created.len(),
            start_date
        ));
        created
    }

    /// Lock shared by concurrent builds of one project.
    fn project_lock(&self, project_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(project_id).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, weak| weak.strong_count() > 0);
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(project_id.to_string(), Arc::downgrade(&lock));
        lock
    }
}

fn tomorrow() -> NaiveDate {
    let today = Utc::now().date_naive();
    today.checked_add_days(Days::new(1)).unwrap_or(today)
}

/// Turn plan entries into days to create.
///
/// Day numbers follow the plan's array order, not `dateOffset`. Unknown scene
/// ids are dropped; a scene planned on two days stays on both.
fn reconcile_plan(
    plan: &SchedulePlan,
    project_id: &str,
    start_date: NaiveDate,
    known: &HashSet<&str>,
    max_scenes_per_day: u32,
    logger: &BuildLogger,
) -> Vec<NewShootingDay> {
    let mut days = Vec::with_capacity(plan.days.len());

    for (index, entry) in plan.days.iter().enumerate() {
        let day_number = index as u32 + 1;
        let date = TimeDelta::try_days(entry.date_offset).and_then(|d| start_date.checked_add_signed(d));
        let Some(date) = date else {
            logger.log_warning(&format!(
                "skipping day {}: dateOffset {} is out of range",
                day_number, entry.date_offset
            ));
            continue;
        };

        let scene_ids: Vec<String> = entry
            .scene_ids
            .iter()
            .filter(|id| known.contains(id.as_str()))
            .cloned()
            .collect();

        let dropped = entry.scene_ids.len() - scene_ids.len();
        if dropped > 0 {
            logger.log_warning(&format!("day {}: dropped {} unknown scene ids", day_number, dropped));
        }
        if scene_ids.len() > max_scenes_per_day as usize {
            logger.log_warning(&format!(
                "day {} has {} scenes, above the requested maximum of {}",
                day_number,
                scene_ids.len(),
                max_scenes_per_day
            ));
        }

        days.push(NewShootingDay {
            project_id: project_id.to_string(),
            date,
            day_number,
            unit: DEFAULT_UNIT.to_string(),
            general_call: entry.general_call.clone(),
            estimated_wrap: entry.estimated_wrap.clone(),
            notes: entry.notes.clone(),
            scene_ids,
        });
    }

    days
}

fn compute_stats(created: &[ShootingDay], scenes: &[Scene]) -> BuildStats {
    let scheduled: HashSet<&str> = created
        .iter()
        .flat_map(|day| day.scene_ids.iter().map(String::as_str))
        .collect();

    BuildStats {
        days_created: created.len(),
        scenes_assigned: created.iter().map(|day| day.scene_ids.len()).sum(),
        scenes_unscheduled: scenes
            .iter()
            .filter(|scene| !scheduled.contains(scene.id.as_str()))
            .count(),
    }
}

#[cfg(test)]
#[path = "schedule_builder_tests.rs"]
mod tests;
