//! Scene repository.
//!
//! Scenes live at `projects/{project_id}/scenes/{scene_id}`.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use slate_models::{Scene, SceneStatus, SceneStore, StoreResult};

use crate::client::{FirestoreClient, MAX_BATCH_WRITES};
use crate::error::FirestoreResult;
use crate::types::{Document, Fields, StructuredQuery, ToFirestoreValue, Write};

pub const SCENES_COLLECTION: &str = "scenes";

/// Repository for a project's scenes.
#[derive(Clone)]
pub struct SceneRepository {
    client: FirestoreClient,
}

impl SceneRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn parent(project_id: &str) -> String {
        format!("projects/{}", project_id)
    }

    fn collection(project_id: &str) -> String {
        format!("projects/{}/{}", project_id, SCENES_COLLECTION)
    }

    /// All scenes of a project ordered by `sort_order`.
    ///
    /// Sorted here rather than in the query: a Firestore `orderBy` silently
    /// drops documents that lack the field.
    pub async fn list(&self, project_id: &str) -> FirestoreResult<Vec<Scene>> {
        let parent = Self::parent(project_id);
        let docs = self
            .client
            .with_retry("list_scenes", || {
                self.client
                    .run_query(&parent, StructuredQuery::collection(SCENES_COLLECTION))
            })
            .await?;

        let mut scenes: Vec<Scene> = docs
            .iter()
            .filter_map(|doc| {
                let scene = document_to_scene(doc, project_id);
                if scene.is_none() {
                    warn!(project_id, name = ?doc.name, "Skipping scene document without an id");
                }
                scene
            })
            .collect();
        scenes.sort_by_key(|s| s.sort_order);
        Ok(scenes)
    }

    /// Set scenes to `SCHEDULED`, one atomic commit per 500 scenes.
    pub async fn set_scheduled(&self, project_id: &str, scene_ids: &[String]) -> FirestoreResult<()> {
        let collection = Self::collection(project_id);
        let now = Utc::now();

        for chunk in scene_ids.chunks(MAX_BATCH_WRITES) {
            let writes: Vec<Write> = chunk
                .iter()
                .map(|id| {
                    let mut fields = Fields::new();
                    fields.insert("status".to_string(), SceneStatus::Scheduled.as_str().to_firestore_value());
                    fields.insert("updated_at".to_string(), now.to_firestore_value());
                    Write::patch_existing(self.client.full_document_name(&collection, id), fields)
                })
                .collect();

            self.client
                .with_retry("mark_scenes_scheduled", || self.client.commit(writes.clone()))
                .await?;
        }

        info!(project_id, count = scene_ids.len(), "Marked scenes scheduled");
        Ok(())
    }
}

#[async_trait]
impl SceneStore for SceneRepository {
    async fn list_for_project(&self, project_id: &str) -> StoreResult<Vec<Scene>> {
        Ok(self.list(project_id).await?)
    }

    async fn mark_scheduled(&self, project_id: &str, scene_ids: &[String]) -> StoreResult<()> {
        Ok(self.set_scheduled(project_id, scene_ids).await?)
    }
}

fn document_to_scene(doc: &Document, project_id: &str) -> Option<Scene> {
    let id = doc.id()?.to_string();
    let text = |key: &str| doc.get::<String>(key).filter(|s| !s.trim().is_empty());

    Some(Scene {
        id,
        project_id: project_id.to_string(),
        scene_number: text("scene_number"),
        synopsis: text("synopsis"),
        int_ext: text("int_ext"),
        day_night: text("day_night"),
        page_count: doc.get("page_count"),
        page_start: doc.get("page_start"),
        sort_order: doc.get("sort_order").unwrap_or(0),
        location_name: text("location_name"),
        status: doc
            .get::<String>("status")
            .map(|s| SceneStatus::from_str_or_default(&s))
            .unwrap_or_default(),
    })
}
