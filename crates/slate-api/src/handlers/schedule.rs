//! Schedule API handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use slate_models::{
    all_templates, build_run_of_day, BuildScheduleRequest, DayScheduleInput, DayScheduleOutput,
    ScheduleBuildResult, ScheduleTemplate,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::ProjectSchedule;
use crate::state::AppState;

/// Envelope used by the schedule endpoints.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Build a shooting schedule for a project.
pub async fn build_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<BuildScheduleRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<ScheduleBuildResult>>> {
    let request = json_body(payload)?;
    let result = state.builder.build(request, &user.uid).await?;
    Ok(DataResponse::new(result))
}

/// Run-of-day request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOfDayRequest {
    #[serde(default)]
    pub day: DayScheduleInput,
    #[serde(default)]
    pub scene_count: usize,
}

/// Compute the run-of-day for a single day.
pub async fn run_of_day(
    _user: AuthUser,
    payload: Result<Json<RunOfDayRequest>, JsonRejection>,
) -> ApiResult<Json<DayScheduleOutput>> {
    let request = json_body(payload)?;
    Ok(Json(build_run_of_day(&request.day, request.scene_count)))
}

/// Template catalog response.
#[derive(Debug, Serialize)]
pub struct TemplatesResponse {
    pub templates: &'static [ScheduleTemplate],
}

/// List the built-in run-of-day templates.
pub async fn list_templates() -> Json<TemplatesResponse> {
    Json(TemplatesResponse {
        templates: all_templates(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    #[serde(default)]
    pub template_id: Option<String>,
}

/// Get a project's shooting days with their run-of-day.
pub async fn get_project_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Json<DataResponse<ProjectSchedule>>> {
    let template_id = query.template_id.as_deref().filter(|t| !t.is_empty());
    let schedule = state
        .schedules
        .project_schedule(&project_id, &user.uid, template_id)
        .await?;
    Ok(DataResponse::new(schedule))
}
