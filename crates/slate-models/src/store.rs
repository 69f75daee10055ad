//! Persistence interfaces consumed by the scheduling services.
//!
//! Services receive these as `Arc<dyn Trait>` so production backends and
//! in-memory fakes are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache_key::CacheEntry;
use crate::scene::{Project, Scene};
use crate::shooting_day::{NewShootingDay, ShootingDay};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Project lookup scoped to the calling user.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// The project if it exists and `uid` may access it.
    async fn find_accessible(&self, project_id: &str, uid: &str) -> StoreResult<Option<Project>>;
}

/// Scene reads and status updates.
#[async_trait]
pub trait SceneStore: Send + Sync {
    /// All scenes of a project ordered by `sort_order`.
    async fn list_for_project(&self, project_id: &str) -> StoreResult<Vec<Scene>>;

    /// Set the given scenes to `SCHEDULED`.
    async fn mark_scheduled(&self, project_id: &str, scene_ids: &[String]) -> StoreResult<()>;
}

/// Row counts removed by a schedule reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCounts {
    pub scene_links: usize,
    pub cast_links: usize,
    pub call_sheets: usize,
    pub days: usize,
}

impl DeletedCounts {
    pub fn total(&self) -> usize {
        self.scene_links + self.cast_links + self.call_sheets + self.days
    }
}

/// Shooting day persistence.
#[async_trait]
pub trait DayStore: Send + Sync {
    /// Remove every day-scoped row of a project, dependants first:
    /// scene links, cast links, call sheets, then days.
    async fn delete_project_schedule(&self, project_id: &str) -> StoreResult<DeletedCounts>;

    /// Create a day with its call-sheet stub and scene links.
    async fn create_day(&self, day: NewShootingDay) -> StoreResult<ShootingDay>;

    /// All days of a project ordered by day number.
    async fn list_days(&self, project_id: &str) -> StoreResult<Vec<ShootingDay>>;
}

/// Best-effort cache of AI responses. Never fails: errors read as misses and
/// writes that fail are dropped.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, endpoint: &str, key: &str) -> Option<Value>;

    async fn set(&self, entry: CacheEntry);

    /// Drop every entry of `endpoint` recorded for a project.
    async fn invalidate_project(&self, endpoint: &str, project_id: &str);
}
