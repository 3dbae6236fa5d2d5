use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use study_core::ChatEntry;
use study_core::ChatTranscriptRecord;
use study_core::Level;
use study_core::TaskNumber;
use study_core::TranscriptDraft;
use study_core::append_transcript;

use super::AppState;
use super::fields;
use crate::error::ApiError;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TranscriptRequest {
    #[serde(default)]
    pre_survey_id: Option<String>,
    #[serde(default)]
    task: Option<Value>,
    #[serde(default)]
    round: Option<Value>,
    #[serde(default)]
    chat_messages: Vec<ChatEntry>,
    /// Accepted in any JSON shape and only logged; the stored level comes
    /// from the assignment.
    #[serde(default)]
    level: Option<Value>,
}

impl TranscriptRequest {
    fn into_draft(self) -> ApiResult<TranscriptDraft> {
        let (Some(raw_key), Some(task)) = (
            fields::optional_text(self.pre_survey_id.as_deref()),
            fields::present(self.task.as_ref()),
        ) else {
            return Err(ApiError::bad_request("preSurveyId and task are required"));
        };
        let participant_key = fields::participant_key(Some(&raw_key))?;
        let task = fields::integer(task)
            .ok_or_else(|| ApiError::bad_request("task must be a number"))?;

        // Task 1 has no rounds.
        let round = match fields::present(self.round.as_ref()) {
            _ if task == i64::from(TaskNumber::BASELINE.get()) => None,
            None => None,
            Some(raw) => {
                let round = fields::integer(raw)
                    .and_then(|r| u32::try_from(r).ok())
                    .ok_or_else(|| ApiError::bad_request("round must be a positive number"))?;
                Some(round)
            }
        };

        Ok(TranscriptDraft {
            participant_key,
            task,
            round,
            entries: self.chat_messages,
            requested_level: self
                .level
                .as_ref()
                .and_then(Value::as_str)
                .and_then(Level::parse),
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TranscriptResponse {
    ok: bool,
    saved: ChatTranscriptRecord,
}

/// `POST /api/chatbotmessages`
pub(super) async fn create_transcript(
    State(state): State<AppState>,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TranscriptResponse>)> {
    let Json(request) = payload?;
    let draft = request.into_draft()?;
    let saved = append_transcript(state.store.as_ref(), draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(TranscriptResponse { ok: true, saved }),
    ))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> TranscriptRequest {
        serde_json::from_value(body).expect("request shape")
    }

    #[test]
    fn string_task_and_round_are_coerced() {
        let key = study_core::ParticipantKey::new();
        let draft = request(json!({
            "preSurveyId": key.to_string(),
            "task": "3",
            "round": 2,
            "level": "high",
            "chatMessages": [{"message": "hi", "direction": "outgoing", "sender": "user"}]
        }))
        .into_draft()
        .expect("valid");
        assert_eq!(draft.task, 3);
        assert_eq!(draft.round, Some(2));
        assert_eq!(draft.requested_level, Some(Level::High));
        assert_eq!(draft.entries[0].text, "hi");
    }

    #[test]
    fn missing_task_is_rejected() {
        let key = study_core::ParticipantKey::new();
        let err = request(json!({ "preSurveyId": key.to_string(), "task": null }))
            .into_draft()
            .expect_err("task missing");
        assert_eq!(err.to_string(), "preSurveyId and task are required");
    }

    #[test]
    fn level_of_any_shape_is_tolerated() {
        let key = study_core::ParticipantKey::new();
        for level in [json!(3), json!({"value": "high"}), json!(["low"]), json!("extreme")] {
            let draft = request(json!({
                "preSurveyId": key.to_string(),
                "task": 3,
                "round": 1,
                "level": level,
                "chatMessages": []
            }))
            .into_draft()
            .expect("level never rejects a transcript");
            assert_eq!(draft.requested_level, None);
        }
    }

    #[test]
    fn baseline_round_is_ignored() {
        let key = study_core::ParticipantKey::new();
        let draft = request(json!({
            "preSurveyId": key.to_string(),
            "task": 1,
            "round": "n/a",
            "chatMessages": []
        }))
        .into_draft()
        .expect("round ignored for task 1");
        assert_eq!(draft.task, 1);
        assert_eq!(draft.round, None);
    }

    #[test]
    fn entries_without_sender_are_accepted() {
        let key = study_core::ParticipantKey::new();
        let draft = request(json!({
            "preSurveyId": key.to_string(),
            "task": 1,
            "chatMessages": [{"message": "hi", "direction": "outgoing"}, {}]
        }))
        .into_draft()
        .expect("loose entries");
        assert_eq!(draft.entries.len(), 2);
        assert!(draft.entries[0].is_from_participant());
        assert_eq!(draft.entries[1].text, "");
    }

    #[test]
    fn negative_round_is_rejected() {
        let key = study_core::ParticipantKey::new();
        let err = request(json!({ "preSurveyId": key.to_string(), "task": 2, "round": -1 }))
            .into_draft()
            .expect_err("bad round");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
