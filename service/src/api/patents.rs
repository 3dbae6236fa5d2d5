//! Item catalogue and assignment routes.

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use study_core::Category;
use study_core::Item;
use study_core::Level;
use study_core::ResolvedAssignment;
use study_core::StudyError;
use study_core::item::sort_for_display;

use super::AppState;
use super::Envelope;
use super::envelope;
use super::fields;
use crate::error::ApiError;
use crate::error::ApiResult;

/// `GET /api/patents`
pub(super) async fn list_patents(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Envelope<Vec<Item>>>)> {
    let mut items = state.store.list_all_items().await?;
    sort_for_display(&mut items);
    Ok(envelope(
        StatusCode::OK,
        "Patents retrieved successfully",
        items,
    ))
}

/// `GET /api/patents/category/:category`. Unknown labels match nothing.
pub(super) async fn list_patents_by_category(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> ApiResult<(StatusCode, Json<Envelope<Vec<Item>>>)> {
    let mut items = match Category::parse(&label) {
        Some(category) => state.store.items_by_category(category).await?,
        None => Vec::new(),
    };
    sort_for_display(&mut items);
    Ok(envelope(
        StatusCode::OK,
        format!("Patents in {label} category retrieved successfully"),
        items,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssignmentRequest {
    #[serde(default)]
    pre_survey_id: Option<String>,
}

/// `POST /api/patent-assignment`: 201 when this call stored the draw, 200
/// when the participant already had one.
pub(super) async fn create_assignment(
    State(state): State<AppState>,
    payload: Result<Json<AssignmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<ResolvedAssignment>>)> {
    let Json(request) = payload?;
    let raw = fields::optional_text(request.pre_survey_id.as_deref())
        .ok_or_else(|| ApiError::bad_request("preSurveyId is required"))?;
    let key = fields::participant_key(Some(&raw))?;

    let outcome = state.engine.get_or_create(key).await?;
    Ok(if outcome.created {
        envelope(
            StatusCode::CREATED,
            "Patents assigned successfully",
            outcome.assignment,
        )
    } else {
        envelope(
            StatusCode::OK,
            "Patents already assigned to this user",
            outcome.assignment,
        )
    })
}

/// `GET /api/patent-assignment/:pre_survey_id`
pub(super) async fn get_assignment(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<(StatusCode, Json<Envelope<ResolvedAssignment>>)> {
    let key = fields::participant_key(Some(&raw))?;
    let assignment = state.engine.get_assignment(key).await.map_err(no_assignment)?;
    Ok(envelope(
        StatusCode::OK,
        "Patent assignment retrieved successfully",
        assignment,
    ))
}

#[derive(Debug, Serialize)]
pub(super) struct TaskPatentResponse {
    success: bool,
    message: String,
    data: Item,
    level: Option<Level>,
}

/// `GET /api/patent-for-task/:pre_survey_id/:task_number`
pub(super) async fn get_patent_for_task(
    State(state): State<AppState>,
    Path((raw_key, raw_task)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<TaskPatentResponse>)> {
    let key = fields::participant_key(Some(&raw_key))?;
    let task = raw_task
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request("Invalid task number. Must be 1, 2, 3, or 4"))?;

    let assignment = state
        .engine
        .get_assignment_for_task(key, task)
        .await
        .map_err(no_assignment)?;

    Ok((
        StatusCode::OK,
        Json(TaskPatentResponse {
            success: true,
            message: format!("Patent for task {} retrieved successfully", assignment.task),
            data: assignment.item,
            level: assignment.level,
        }),
    ))
}

fn no_assignment(err: StudyError) -> ApiError {
    match err {
        StudyError::NotFound { .. } => {
            ApiError::not_found("No patent assignment found for this user")
        }
        other => ApiError::Study(other),
    }
}
