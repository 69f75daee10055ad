//! Scene extraction handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use slate_models::{reconcile_extracted_scenes, ExtractedChunk, ExtractedScene};

use super::schedule::{json_body, DataResponse};
use crate::auth::AuthUser;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct ReconcileScenesRequest {
    #[serde(default)]
    pub chunks: Vec<ExtractedChunk>,
}

#[derive(Debug, Serialize)]
pub struct ReconciledScenes {
    pub scenes: Vec<ExtractedScene>,
}

/// Merge chunked script extraction output into one page-ordered scene list.
pub async fn reconcile_scenes(
    user: AuthUser,
    payload: Result<Json<ReconcileScenesRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<ReconciledScenes>>> {
    let request = json_body(payload)?;
    let chunk_count = request.chunks.len();
    let scenes = reconcile_extracted_scenes(request.chunks);
    debug!(uid = %user.uid, chunk_count, scene_count = scenes.len(), "Reconciled extracted scenes");
    Ok(DataResponse::new(ReconciledScenes { scenes }))
}
