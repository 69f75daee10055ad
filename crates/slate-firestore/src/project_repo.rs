//! Project lookups.
//!
//! Projects live at `projects/{project_id}` with `name`, `owner_id` and
//! `member_ids` fields.

use async_trait::async_trait;
use slate_models::{Project, ProjectStore, StoreResult};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::Document;

pub const PROJECTS_COLLECTION: &str = "projects";

/// Repository for project documents.
#[derive(Clone)]
pub struct ProjectRepository {
    client: FirestoreClient,
}

impl ProjectRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, project_id: &str) -> FirestoreResult<Option<Project>> {
        let doc = self
            .client
            .with_retry("get_project", || {
                self.client.get_document(PROJECTS_COLLECTION, project_id)
            })
            .await?;

        Ok(doc.map(|d| document_to_project(&d, project_id)))
    }
}

#[async_trait]
impl ProjectStore for ProjectRepository {
    async fn find_accessible(&self, project_id: &str, uid: &str) -> StoreResult<Option<Project>> {
        let project = self.get(project_id).await?;
        Ok(project.filter(|p| p.is_accessible_by(uid)))
    }
}

fn document_to_project(doc: &Document, project_id: &str) -> Project {
    Project {
        id: project_id.to_string(),
        name: doc.get("name").unwrap_or_default(),
        owner_id: doc.get("owner_id").unwrap_or_default(),
        member_ids: doc.get("member_ids").unwrap_or_default(),
    }
}
