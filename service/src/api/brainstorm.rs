//! Brainstorm idea submissions (baseline and AI-assisted forms).

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use study_core::RecordId;
use study_core::TaskNumber;
use study_core::survey::BrainstormKind;
use study_core::survey::BrainstormResponse;
use study_core::survey::UseCase;

use super::AppState;
use super::fields;
use crate::error::ApiError;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BrainstormRequest {
    #[serde(default)]
    pre_survey_id: Option<String>,
    #[serde(default)]
    use_cases: Vec<UseCase>,
    #[serde(default)]
    round: Option<Value>,
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    task: Option<Value>,
    #[serde(default)]
    temperature: Option<f64>,
}

impl BrainstormRequest {
    fn into_response(self, kind: BrainstormKind) -> ApiResult<BrainstormResponse> {
        let participant_key = fields::participant_key(self.pre_survey_id.as_deref())?;

        let (round, object, task, temperature) = match kind {
            BrainstormKind::Baseline => (None, None, None, None),
            BrainstormKind::Assisted => {
                let round = fields::present(self.round.as_ref())
                    .map(|raw| {
                        fields::integer(raw)
                            .and_then(|r| u32::try_from(r).ok())
                            .ok_or_else(|| ApiError::bad_request("round must be a positive number"))
                    })
                    .transpose()?;
                let task = fields::present(self.task.as_ref())
                    .map(|raw| {
                        fields::integer(raw)
                            .ok_or_else(|| ApiError::bad_request("task must be a number"))
                            .and_then(|t| TaskNumber::new(t).map_err(ApiError::from))
                    })
                    .transpose()?;
                (
                    round,
                    fields::optional_text(self.object.as_deref()),
                    task,
                    self.temperature,
                )
            }
        };

        Ok(BrainstormResponse {
            id: RecordId::new(),
            participant_key,
            kind,
            use_cases: self.use_cases,
            round,
            object,
            task,
            temperature,
            created_at: Utc::now(),
        })
    }
}

/// `POST /api/AUT`
pub(super) async fn create_baseline(
    state: State<AppState>,
    payload: Result<Json<BrainstormRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BrainstormResponse>)> {
    store_brainstorm(state, payload, BrainstormKind::Baseline).await
}

/// `POST /api/AUT_gpt`
pub(super) async fn create_assisted(
    state: State<AppState>,
    payload: Result<Json<BrainstormRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BrainstormResponse>)> {
    store_brainstorm(state, payload, BrainstormKind::Assisted).await
}

async fn store_brainstorm(
    State(state): State<AppState>,
    payload: Result<Json<BrainstormRequest>, JsonRejection>,
    kind: BrainstormKind,
) -> ApiResult<(StatusCode, Json<BrainstormResponse>)> {
    let Json(request) = payload?;
    let response = request.into_response(kind)?;
    state.store.insert_brainstorm(&response).await?;
    tracing::info!(
        participant = %response.participant_key,
        kind = kind.as_str(),
        ideas = response.use_cases.len(),
        "brainstorm stored"
    );
    Ok((StatusCode::CREATED, Json(response)))
}
