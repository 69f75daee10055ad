//! Read side of a project's schedule.
//!
//! Days are rendered with their run-of-day and cached under the
//! `schedule-view` endpoint until the next build invalidates them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use slate_models::{build_key, CacheEntry, DayStore, ProjectStore, ResponseCache, ScheduledDay};

use super::schedule_builder::{BuildError, SCHEDULE_VIEW_ENDPOINT};

/// A project's schedule as shown to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSchedule {
    pub project_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    pub shooting_days: Vec<ScheduledDay>,
}

pub struct ScheduleViewService {
    projects: Arc<dyn ProjectStore>,
    days: Arc<dyn DayStore>,
    cache: Arc<dyn ResponseCache>,
    ttl_secs: u64,
}

impl ScheduleViewService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        days: Arc<dyn DayStore>,
        cache: Arc<dyn ResponseCache>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            projects,
            days,
            cache,
            ttl_secs,
        }
    }

    /// The project's days with run-of-day computed from `template_id`.
    pub async fn project_schedule(
        &self,
        project_id: &str,
        uid: &str,
        template_id: Option<&str>,
    ) -> Result<ProjectSchedule, BuildError> {
        self.projects
            .find_accessible(project_id, uid)
            .await?
            .ok_or_else(|| BuildError::NotFound("Project not found".to_string()))?;

        let key = build_key(&json!({"scope": project_id, "templateId": template_id}));
        if let Some(cached) = self.cache.get(SCHEDULE_VIEW_ENDPOINT, &key).await {
            match serde_json::from_value::<ProjectSchedule>(cached) {
                Ok(schedule) => {
                    debug!(project_id, "Serving cached schedule view");
                    return Ok(schedule);
                }
                Err(e) => warn!(project_id, error = %e, "Discarding unreadable cached schedule view"),
            }
        }

        let shooting_days = self
            .days
            .list_days(project_id)
            .await?
            .into_iter()
            .map(|day| {
                let run_of_day = day.run_of_day(template_id);
                ScheduledDay { day, run_of_day }
            })
            .collect();

        let schedule = ProjectSchedule {
            project_id: project_id.to_string(),
            template_id: template_id.map(str::to_string),
            shooting_days,
        };

        match serde_json::to_value(&schedule) {
            Ok(value) => {
                self.cache
                    .set(CacheEntry::new(
                        SCHEDULE_VIEW_ENDPOINT,
                        key,
                        value,
                        self.ttl_secs,
                        Some(project_id.to_string()),
                        uid,
                    ))
                    .await
            }
            Err(e) => warn!(project_id, error = %e, "Could not cache schedule view"),
        }

        Ok(schedule)
    }
}
