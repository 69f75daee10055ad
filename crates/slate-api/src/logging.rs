//! Structured logging for schedule builds.
//!
//! Every build gets a [`BuildLogger`] that tags its events with the build id,
//! project id and current [`BuildPhase`]. The outcome line always carries the
//! elapsed time, on success and failure alike.

use std::fmt;
use std::time::Instant;

use tracing::{error, info, warn, Span};
use uuid::Uuid;

use slate_models::BuildStats;

/// State of a build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Validating,
    FetchingScenes,
    PromptingAi,
    Parsing,
    Reconciling,
    Persisting,
    Done,
    Failed,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Validating => "validating",
            BuildPhase::FetchingScenes => "fetching_scenes",
            BuildPhase::PromptingAi => "prompting_ai",
            BuildPhase::Parsing => "parsing",
            BuildPhase::Reconciling => "reconciling",
            BuildPhase::Persisting => "persisting",
            BuildPhase::Done => "done",
            BuildPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildPhase::Done | BuildPhase::Failed)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logger for one schedule build.
#[derive(Debug)]
pub struct BuildLogger {
    build_id: String,
    project_id: String,
    phase: BuildPhase,
    started: Instant,
}

impl BuildLogger {
    pub fn new(project_id: &str) -> Self {
        Self {
            build_id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            phase: BuildPhase::Validating,
            started: Instant::now(),
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Move to `phase`. Terminal phases are final.
    pub fn enter(&mut self, phase: BuildPhase) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = phase;
    }

    pub fn log_start(&self, message: &str) {
        info!(
            build_id = %self.build_id,
            project_id = %self.project_id,
            phase = %self.phase,
            "Schedule build started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            build_id = %self.build_id,
            project_id = %self.project_id,
            phase = %self.phase,
            "Schedule build progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            build_id = %self.build_id,
            project_id = %self.project_id,
            phase = %self.phase,
            "Schedule build warning: {}", message
        );
    }

    /// A condition that does not fail the build but needs attention.
    pub fn log_error(&self, message: &str) {
        error!(
            build_id = %self.build_id,
            project_id = %self.project_id,
            phase = %self.phase,
            "Schedule build error: {}", message
        );
    }

    /// Log the successful outcome and enter [`BuildPhase::Done`].
    pub fn log_completion(&mut self, stats: &BuildStats, cache_hit: bool) {
        self.enter(BuildPhase::Done);
        info!(
            build_id = %self.build_id,
            project_id = %self.project_id,
            phase = %self.phase,
            elapsed_ms = self.elapsed_ms(),
            days_created = stats.days_created,
            scenes_assigned = stats.scenes_assigned,
            scenes_unscheduled = stats.scenes_unscheduled,
            cache_hit,
            "Schedule build completed"
        );
    }

    /// Log the failure outcome, naming the phase that failed, and enter
    /// [`BuildPhase::Failed`].
    pub fn log_failure(&mut self, error: &dyn fmt::Display) {
        let failed_in = self.phase;
        self.enter(BuildPhase::Failed);
        error!(
            build_id = %self.build_id,
            project_id = %self.project_id,
            phase = %self.phase,
            failed_in = %failed_in,
            elapsed_ms = self.elapsed_ms(),
            error = %error,
            "Schedule build failed"
        );
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "schedule_build",
            build_id = %self.build_id,
            project_id = %self.project_id
        )
    }
}
