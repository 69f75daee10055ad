//! Content-addressed cache for AI responses.
//!
//! Entries live in the root `ai_cache` collection under the id
//! `{endpoint}__{cache_key}`. Expiry is enforced on read: an expired entry is
//! deleted and reported as a miss. Every failure is logged and swallowed so the
//! cache never sits on the critical path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use slate_models::{CacheEntry, ResponseCache};

use crate::client::{FirestoreClient, MAX_BATCH_WRITES};
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::{record_cache_lookup, record_cache_write_error, CacheLookup};
use crate::types::{Document, Fields, Filter, StructuredQuery, ToFirestoreValue, Write};

pub const AI_CACHE_COLLECTION: &str = "ai_cache";

/// Document id of a cache entry.
pub fn cache_doc_id(endpoint: &str, cache_key: &str) -> String {
    format!("{}__{}", endpoint, cache_key)
}

/// Firestore-backed [`ResponseCache`].
#[derive(Clone)]
pub struct FirestoreResponseCache {
    client: FirestoreClient,
}

impl FirestoreResponseCache {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    async fn lookup(&self, endpoint: &str, cache_key: &str) -> FirestoreResult<Option<JsonValue>> {
        let doc_id = cache_doc_id(endpoint, cache_key);
        let Some(doc) = self.client.get_document(AI_CACHE_COLLECTION, &doc_id).await? else {
            record_cache_lookup(endpoint, CacheLookup::Miss);
            return Ok(None);
        };

        let entry = document_to_entry(&doc)?;
        if entry.is_expired_at(Utc::now()) {
            if let Err(e) = self.client.delete_document(AI_CACHE_COLLECTION, &doc_id).await {
                warn!(endpoint, error = %e, "Failed to evict expired AI cache entry");
            }
            record_cache_lookup(endpoint, CacheLookup::Expired);
            debug!(endpoint, "AI cache miss (expired)");
            return Ok(None);
        }

        record_cache_lookup(endpoint, CacheLookup::Hit);
        debug!(endpoint, "AI cache hit");
        Ok(Some(entry.response))
    }

    async fn store(&self, entry: &CacheEntry) -> FirestoreResult<()> {
        let fields = entry_to_fields(entry)?;
        self.client
            .upsert_document(
                AI_CACHE_COLLECTION,
                &cache_doc_id(&entry.endpoint, &entry.cache_key),
                fields,
            )
            .await?;
        Ok(())
    }

    async fn delete_for_project(&self, endpoint: &str, project_id: &str) -> FirestoreResult<usize> {
        let query = StructuredQuery::collection(AI_CACHE_COLLECTION).filter(Filter::and(vec![
            Filter::equals("endpoint", endpoint.to_firestore_value()),
            Filter::equals("project_id", project_id.to_firestore_value()),
        ]));

        let names: Vec<String> = self
            .client
            .run_query("", query)
            .await?
            .into_iter()
            .filter_map(|doc| doc.name)
            .collect();

        for chunk in names.chunks(MAX_BATCH_WRITES) {
            self.client
                .commit(chunk.iter().cloned().map(Write::delete).collect())
                .await?;
        }
        Ok(names.len())
    }
}

#[async_trait]
impl ResponseCache for FirestoreResponseCache {
    async fn get(&self, endpoint: &str, key: &str) -> Option<JsonValue> {
        match self.lookup(endpoint, key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(endpoint, error = %e, "AI cache read failed, treating as miss");
                record_cache_lookup(endpoint, CacheLookup::Error);
                None
            }
        }
    }

    async fn set(&self, entry: CacheEntry) {
        if let Err(e) = self.store(&entry).await {
            warn!(endpoint = %entry.endpoint, error = %e, "AI cache write failed");
            record_cache_write_error(&entry.endpoint, "set");
        }
    }

    async fn invalidate_project(&self, endpoint: &str, project_id: &str) {
        match self.delete_for_project(endpoint, project_id).await {
            Ok(count) => debug!(endpoint, project_id, count, "Invalidated AI cache entries"),
            Err(e) => {
                warn!(endpoint, project_id, error = %e, "AI cache invalidation failed");
                record_cache_write_error(endpoint, "invalidate");
            }
        }
    }
}

fn entry_to_fields(entry: &CacheEntry) -> FirestoreResult<Fields> {
    let mut fields = Fields::new();
    fields.insert("endpoint".to_string(), entry.endpoint.to_firestore_value());
    fields.insert("cache_key".to_string(), entry.cache_key.to_firestore_value());
    // Stored as a string: Firestore maps cannot hold every JSON shape (e.g. nested arrays).
    fields.insert(
        "response".to_string(),
        serde_json::to_string(&entry.response)?.to_firestore_value(),
    );
    fields.insert("project_id".to_string(), entry.project_id.to_firestore_value());
    fields.insert("user_id".to_string(), entry.user_id.to_firestore_value());
    fields.insert("expires_at".to_string(), entry.expires_at.to_firestore_value());
    fields.insert("updated_at".to_string(), entry.updated_at.to_firestore_value());
    Ok(fields)
}

fn document_to_entry(doc: &Document) -> FirestoreResult<CacheEntry> {
    let response: String = doc
        .get("response")
        .ok_or_else(|| FirestoreError::invalid_response("AI cache entry has no response"))?;
    let expires_at: DateTime<Utc> = doc
        .get("expires_at")
        .ok_or_else(|| FirestoreError::invalid_response("AI cache entry has no expires_at"))?;

    Ok(CacheEntry {
        endpoint: doc.get("endpoint").unwrap_or_default(),
        cache_key: doc.get("cache_key").unwrap_or_default(),
        response: serde_json::from_str(&response)?,
        project_id: doc.get("project_id"),
        user_id: doc.get("user_id").unwrap_or_default(),
        expires_at,
        updated_at: doc.get("updated_at").unwrap_or(expires_at),
    })
}
