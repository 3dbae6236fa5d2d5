use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde::Serialize;

use super::AppState;
use crate::completion::ChatMessage;
use crate::completion::CompletionOverrides;
use crate::error::ApiError;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub(super) struct CompletionRequest {
    messages: Vec<ChatMessage>,
    #[serde(default)]
    config: Option<CompletionOverrides>,
}

#[derive(Debug, Serialize)]
pub(super) struct CompletionReply {
    reply: ChatMessage,
}

/// `POST /api/openai`
pub(super) async fn complete(
    State(state): State<AppState>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> ApiResult<Json<CompletionReply>> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("messages must not be empty"));
    }

    let reply = state
        .completion
        .complete(&request.messages, request.config.unwrap_or_default())
        .await
        .map_err(|err| {
            tracing::warn!(model = state.completion.model(), "completion failed: {err}");
            ApiError::from(err)
        })?;
    Ok(Json(CompletionReply { reply }))
}
