//! Shooting day repository.
//!
//! Day-scoped collections under `projects/{project_id}/`:
//! - `shooting_days/{day_id}`
//! - `shooting_day_scenes/{link_id}`: `shooting_day_id`, `scene_id`, `sort_order`
//! - `shooting_day_cast/{link_id}`: written by the cast module, removed here on reset
//! - `call_sheets/{call_sheet_id}`: one `DRAFT` stub per day
//!
//! A day and all of its rows are committed together, so a failed day leaves
//! nothing behind.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use slate_models::{
    DayStatus, DayStore, DeletedCounts, NewShootingDay, ShootingDay, StoreResult,
};

use crate::client::{FirestoreClient, MAX_BATCH_WRITES};
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_deleted;
use crate::types::{Document, Fields, StructuredQuery, ToFirestoreValue, Write};

pub const DAYS_COLLECTION: &str = "shooting_days";
pub const DAY_SCENES_COLLECTION: &str = "shooting_day_scenes";
pub const DAY_CAST_COLLECTION: &str = "shooting_day_cast";
pub const CALL_SHEETS_COLLECTION: &str = "call_sheets";

/// Status given to call sheets created alongside a day.
pub const CALL_SHEET_DRAFT: &str = "DRAFT";

/// Deletion order for a schedule reset: rows that reference a day go first.
pub const RESET_ORDER: [&str; 4] = [
    DAY_SCENES_COLLECTION,
    DAY_CAST_COLLECTION,
    CALL_SHEETS_COLLECTION,
    DAYS_COLLECTION,
];

/// Repository for shooting days and their dependent rows.
#[derive(Clone)]
pub struct ScheduleRepository {
    client: FirestoreClient,
}

impl ScheduleRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn parent(project_id: &str) -> String {
        format!("projects/{}", project_id)
    }

    fn document_name(&self, project_id: &str, collection: &str, doc_id: &str) -> String {
        self.client
            .full_document_name(&format!("{}/{}", Self::parent(project_id), collection), doc_id)
    }

    async fn list_collection(&self, project_id: &str, collection: &str) -> FirestoreResult<Vec<Document>> {
        let parent = Self::parent(project_id);
        self.client
            .with_retry("list_schedule_rows", || {
                self.client
                    .run_query(&parent, StructuredQuery::collection(collection))
            })
            .await
    }

    /// Delete every document of one collection, 500 per atomic commit.
    async fn delete_collection(&self, project_id: &str, collection: &str) -> FirestoreResult<usize> {
        let names: Vec<String> = self
            .list_collection(project_id, collection)
            .await?
            .into_iter()
            .filter_map(|doc| doc.name)
            .collect();

        for chunk in names.chunks(MAX_BATCH_WRITES) {
            let writes: Vec<Write> = chunk.iter().cloned().map(Write::delete).collect();
            self.client
                .with_retry("delete_schedule_rows", || self.client.commit(writes.clone()))
                .await?;
        }

        record_deleted(collection, names.len());
        debug!(project_id, collection, count = names.len(), "Deleted schedule rows");
        Ok(names.len())
    }

    /// Remove the project's schedule in dependency order.
    pub async fn reset(&self, project_id: &str) -> FirestoreResult<DeletedCounts> {
        let mut counts = DeletedCounts::default();
        for collection in RESET_ORDER {
            let deleted = self.delete_collection(project_id, collection).await?;
            match collection {
                DAY_SCENES_COLLECTION => counts.scene_links = deleted,
                DAY_CAST_COLLECTION => counts.cast_links = deleted,
                CALL_SHEETS_COLLECTION => counts.call_sheets = deleted,
                _ => counts.days = deleted,
            }
        }

        info!(
            project_id,
            scene_links = counts.scene_links,
            cast_links = counts.cast_links,
            call_sheets = counts.call_sheets,
            days = counts.days,
            "Reset project schedule"
        );
        Ok(counts)
    }

    /// Writes that create a day, its call-sheet stub and its scene links.
    fn day_writes(&self, day: &ShootingDay) -> Vec<Write> {
        let project_id = &day.project_id;
        let mut writes = Vec::with_capacity(day.scene_ids.len() + 2);

        writes.push(Write::upsert(
            self.document_name(project_id, DAYS_COLLECTION, &day.id),
            day_to_fields(day),
        ));

        let mut sheet = Fields::new();
        sheet.insert("shooting_day_id".to_string(), day.id.to_firestore_value());
        sheet.insert("status".to_string(), CALL_SHEET_DRAFT.to_firestore_value());
        sheet.insert("created_at".to_string(), day.created_at.to_firestore_value());
        writes.push(Write::upsert(
            self.document_name(project_id, CALL_SHEETS_COLLECTION, &Uuid::new_v4().to_string()),
            sheet,
        ));

        for (position, scene_id) in day.scene_ids.iter().enumerate() {
            let mut link = Fields::new();
            link.insert("shooting_day_id".to_string(), day.id.to_firestore_value());
            link.insert("scene_id".to_string(), scene_id.to_firestore_value());
            link.insert("sort_order".to_string(), position.to_firestore_value());
            writes.push(Write::upsert(
                self.document_name(project_id, DAY_SCENES_COLLECTION, &Uuid::new_v4().to_string()),
                link,
            ));
        }

        writes
    }

    /// Create a day with its call sheet and scene links in one commit.
    pub async fn create(&self, new_day: NewShootingDay) -> FirestoreResult<ShootingDay> {
        let day = ShootingDay::from_new(new_day);
        let writes = self.day_writes(&day);
        if writes.len() > MAX_BATCH_WRITES {
            return Err(FirestoreError::request_failed(format!(
                "Day {} has {} scenes, more than one commit can hold",
                day.day_number,
                day.scene_ids.len()
            )));
        }

        self.client
            .with_retry("create_shooting_day", || self.client.commit(writes.clone()))
            .await?;

        info!(
            project_id = %day.project_id,
            day_id = %day.id,
            day_number = day.day_number,
            scenes = day.scene_ids.len(),
            "Created shooting day"
        );
        Ok(day)
    }

    /// Days of a project ordered by day number, then date.
    pub async fn list(&self, project_id: &str) -> FirestoreResult<Vec<ShootingDay>> {
        let mut days: Vec<ShootingDay> = self
            .list_collection(project_id, DAYS_COLLECTION)
            .await?
            .iter()
            .filter_map(|doc| document_to_day(doc, project_id))
            .collect();
        days.sort_by(|a, b| a.day_number.cmp(&b.day_number).then(a.date.cmp(&b.date)));
        Ok(days)
    }
}

#[async_trait]
impl DayStore for ScheduleRepository {
    async fn delete_project_schedule(&self, project_id: &str) -> StoreResult<DeletedCounts> {
        Ok(self.reset(project_id).await?)
    }

    async fn create_day(&self, day: NewShootingDay) -> StoreResult<ShootingDay> {
        Ok(self.create(day).await?)
    }

    async fn list_days(&self, project_id: &str) -> StoreResult<Vec<ShootingDay>> {
        Ok(self.list(project_id).await?)
    }
}

fn day_to_fields(day: &ShootingDay) -> Fields {
    let mut fields = Fields::new();
    fields.insert("project_id".to_string(), day.project_id.to_firestore_value());
    fields.insert("date".to_string(), day.date.format("%Y-%m-%d").to_string().to_firestore_value());
    fields.insert("day_number".to_string(), day.day_number.to_firestore_value());
    fields.insert("unit".to_string(), day.unit.to_firestore_value());
    fields.insert("status".to_string(), day.status.as_str().to_firestore_value());
    fields.insert("general_call".to_string(), day.general_call.to_firestore_value());
    fields.insert("estimated_wrap".to_string(), day.estimated_wrap.to_firestore_value());
    fields.insert("notes".to_string(), day.notes.to_firestore_value());
    fields.insert("scene_ids".to_string(), day.scene_ids.to_firestore_value());
    fields.insert("created_at".to_string(), day.created_at.to_firestore_value());
    fields
}

fn document_to_day(doc: &Document, project_id: &str) -> Option<ShootingDay> {
    let date = doc
        .get::<String>("date")
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())?;

    Some(ShootingDay {
        id: doc.id()?.to_string(),
        project_id: project_id.to_string(),
        date,
        day_number: doc.get("day_number").unwrap_or(0),
        unit: doc.get("unit").unwrap_or_else(|| slate_models::DEFAULT_UNIT.to_string()),
        status: doc
            .get::<String>("status")
            .map(|s| DayStatus::from_str_or_default(&s))
            .unwrap_or_default(),
        general_call: doc.get("general_call"),
        estimated_wrap: doc.get("estimated_wrap"),
        notes: doc.get("notes"),
        scene_ids: doc.get("scene_ids").unwrap_or_default(),
        created_at: doc.get("created_at").unwrap_or_else(Utc::now),
    })
}
