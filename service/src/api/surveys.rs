//! Per-task post-surveys and the final post-survey.

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use study_core::RecordId;
use study_core::TaskNumber;
use study_core::survey::AiAccuracy;
use study_core::survey::AiAnswersUpdate;
use study_core::survey::AiHelpfulness;
use study_core::survey::Confidence;
use study_core::survey::Difficulty;
use study_core::survey::PostSurvey;
use study_core::survey::TaskPostSurvey;
use study_core::survey::TaskSurveyAnswers;

use super::AppState;
use super::fields;
use crate::error::ApiError;
use crate::error::ApiResult;

const SURVEY_NOT_FOUND: &str = "Task post-survey not found";

/// `{message, data}` body used by the task post-survey routes.
#[derive(Debug, Serialize)]
pub(super) struct SurveyEnvelope<T> {
    message: &'static str,
    data: T,
}

fn survey_envelope<T>(
    status: StatusCode,
    message: &'static str,
    data: T,
) -> (StatusCode, Json<SurveyEnvelope<T>>) {
    (status, Json(SurveyEnvelope { message, data }))
}

type SurveyReply<T> = ApiResult<(StatusCode, Json<SurveyEnvelope<T>>)>;

// ─────────────────────────────────────────────────────────────────────────────
// Task post-survey
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TaskSurveyRequest {
    #[serde(default)]
    pre_survey_id: Option<String>,
    #[serde(default)]
    task_number: Option<Value>,
    #[serde(default)]
    accuracy: Option<String>,
    #[serde(default)]
    helpfulness: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
}

/// Parse one answer given as a slug or its full text.
fn scale_answer<T>(
    field: &str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
    errors: &mut Vec<String>,
) -> Option<T> {
    let raw = fields::required_text(field, raw, errors)?;
    let answer = parse(&raw);
    if answer.is_none() {
        errors.push(format!("'{raw}' is not a valid answer for {field}"));
    }
    answer
}

impl TaskSurveyRequest {
    fn into_survey(self) -> ApiResult<TaskPostSurvey> {
        let (Some(raw_key), Some(raw_task)) = (
            fields::optional_text(self.pre_survey_id.as_deref()),
            fields::present(self.task_number.as_ref()),
        ) else {
            return Err(ApiError::bad_request(
                "preSurveyId and taskNumber are required",
            ));
        };
        let key = fields::participant_key(Some(&raw_key))?;
        let task = fields::integer(raw_task)
            .ok_or_else(|| ApiError::bad_request("taskNumber must be a number"))
            .and_then(|t| TaskNumber::new(t).map_err(ApiError::from))?;

        let mut errors = Vec::new();
        let answers = if task.is_baseline() {
            let confidence = scale_answer(
                "confidence",
                self.confidence.as_deref(),
                Confidence::parse,
                &mut errors,
            );
            let difficulty = scale_answer(
                "difficulty",
                self.difficulty.as_deref(),
                Difficulty::parse,
                &mut errors,
            );
            confidence
                .zip(difficulty)
                .map(|(confidence, difficulty)| TaskSurveyAnswers::Baseline {
                    confidence,
                    difficulty,
                })
        } else {
            let accuracy = scale_answer(
                "accuracy",
                self.accuracy.as_deref(),
                AiAccuracy::parse,
                &mut errors,
            );
            let helpfulness = scale_answer(
                "helpfulness",
                self.helpfulness.as_deref(),
                AiHelpfulness::parse,
                &mut errors,
            );
            accuracy
                .zip(helpfulness)
                .map(|(accuracy, helpfulness)| TaskSurveyAnswers::Assisted {
                    accuracy,
                    helpfulness,
                })
        };

        answers
            .and_then(|answers| TaskPostSurvey::new(key, task, answers))
            .ok_or(ApiError::Validation(errors))
    }
}

/// `POST /api/task-post-survey`
pub(super) async fn create_task_survey(
    State(state): State<AppState>,
    payload: Result<Json<TaskSurveyRequest>, JsonRejection>,
) -> SurveyReply<TaskPostSurvey> {
    let Json(request) = payload?;
    let survey = request.into_survey()?;
    state.store.insert_task_survey(&survey).await?;
    tracing::info!(
        participant = %survey.participant_key,
        task = survey.task_number.get(),
        "task post-survey stored"
    );
    Ok(survey_envelope(
        StatusCode::CREATED,
        "Task post-survey submitted successfully",
        survey,
    ))
}

/// `GET /api/task-post-survey`, newest first
pub(super) async fn list_task_surveys(
    State(state): State<AppState>,
) -> SurveyReply<Vec<TaskPostSurvey>> {
    let surveys = state.store.list_task_surveys().await?;
    Ok(survey_envelope(
        StatusCode::OK,
        "Task post-surveys retrieved successfully",
        surveys,
    ))
}

fn survey_id(raw: &str) -> ApiResult<RecordId> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid task post-survey ID"))
}

/// `GET /api/task-post-survey/:id`
pub(super) async fn get_task_survey(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> SurveyReply<TaskPostSurvey> {
    let survey = state
        .store
        .get_task_survey(survey_id(&raw)?)
        .await?
        .ok_or_else(|| ApiError::not_found(SURVEY_NOT_FOUND))?;
    Ok(survey_envelope(
        StatusCode::OK,
        "Task post-survey retrieved successfully",
        survey,
    ))
}

/// `GET /api/task-post-survey/by-presurvey/:pre_survey_id`
pub(super) async fn task_surveys_for_participant(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> SurveyReply<Vec<TaskPostSurvey>> {
    let key = raw
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid preSurvey ID"))?;
    let surveys = state.store.task_surveys_for(key).await?;
    Ok(survey_envelope(
        StatusCode::OK,
        "Task post-surveys retrieved successfully",
        surveys,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AiAnswersRequest {
    #[serde(default)]
    ai_accuracy: Option<String>,
    #[serde(default)]
    ai_helpfulness: Option<String>,
}

impl AiAnswersRequest {
    fn into_update(self) -> ApiResult<AiAnswersUpdate> {
        let mut errors = Vec::new();
        let ai_accuracy = fields::optional_text(self.ai_accuracy.as_deref()).and_then(|raw| {
            let answer = AiAccuracy::parse(&raw);
            if answer.is_none() {
                errors.push(format!("'{raw}' is not a valid answer for aiAccuracy"));
            }
            answer
        });
        let ai_helpfulness =
            fields::optional_text(self.ai_helpfulness.as_deref()).and_then(|raw| {
                let answer = AiHelpfulness::parse(&raw);
                if answer.is_none() {
                    errors.push(format!("'{raw}' is not a valid answer for aiHelpfulness"));
                }
                answer
            });
        if errors.is_empty() {
            Ok(AiAnswersUpdate {
                ai_accuracy,
                ai_helpfulness,
            })
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// `PUT /api/task-post-survey/:id`
pub(super) async fn update_task_survey(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    payload: Result<Json<AiAnswersRequest>, JsonRejection>,
) -> SurveyReply<TaskPostSurvey> {
    let id = survey_id(&raw)?;
    let Json(request) = payload?;
    let update = request.into_update()?;
    let survey = state
        .store
        .update_task_survey(id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found(SURVEY_NOT_FOUND))?;
    Ok(survey_envelope(
        StatusCode::OK,
        "Task post-survey updated successfully",
        survey,
    ))
}

/// `DELETE /api/task-post-survey/:id`
pub(super) async fn delete_task_survey(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> SurveyReply<TaskPostSurvey> {
    let survey = state
        .store
        .delete_task_survey(survey_id(&raw)?)
        .await?
        .ok_or_else(|| ApiError::not_found(SURVEY_NOT_FOUND))?;
    tracing::info!(survey = %survey.id, "task post-survey deleted");
    Ok(survey_envelope(
        StatusCode::OK,
        "Task post-survey deleted successfully",
        survey,
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Final post-survey
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PostSurveyRequest {
    #[serde(default)]
    pre_survey_id: Option<String>,
    #[serde(default)]
    accuracy: Option<String>,
    #[serde(default)]
    helpfulness: Option<String>,
    #[serde(default)]
    inspiration: Option<String>,
    #[serde(default)]
    expansion: Option<String>,
    #[serde(default)]
    recombination: Option<String>,
    #[serde(default)]
    problems: Option<String>,
    #[serde(default)]
    improvements: Option<String>,
    #[serde(default)]
    agree_to_terms: Option<bool>,
}

impl PostSurveyRequest {
    fn into_survey(self) -> ApiResult<PostSurvey> {
        let participant_key = fields::participant_key(self.pre_survey_id.as_deref())?;

        let mut errors = Vec::new();
        let accuracy = fields::required_text("accuracy", self.accuracy.as_deref(), &mut errors);
        let helpfulness =
            fields::required_text("helpfulness", self.helpfulness.as_deref(), &mut errors);
        let inspiration =
            fields::required_text("inspiration", self.inspiration.as_deref(), &mut errors);
        let expansion = fields::required_text("expansion", self.expansion.as_deref(), &mut errors);
        let recombination =
            fields::required_text("recombination", self.recombination.as_deref(), &mut errors);

        match (accuracy, helpfulness, inspiration, expansion, recombination) {
            (
                Some(accuracy),
                Some(helpfulness),
                Some(inspiration),
                Some(expansion),
                Some(recombination),
            ) => Ok(PostSurvey {
                id: RecordId::new(),
                participant_key,
                accuracy,
                helpfulness,
                inspiration,
                expansion,
                recombination,
                problems: fields::optional_text(self.problems.as_deref()),
                improvements: fields::optional_text(self.improvements.as_deref()),
                agree_to_terms: self.agree_to_terms,
                created_at: Utc::now(),
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// `POST /api/PostSurvey`
pub(super) async fn create_post_survey(
    State(state): State<AppState>,
    payload: Result<Json<PostSurveyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let survey = request.into_survey()?;
    state.store.insert_post_survey(&survey).await?;
    tracing::info!(participant = %survey.participant_key, "post-survey stored");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Survey submitted successfully",
            "_id": survey.id,
        })),
    ))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use study_core::ParticipantKey;

    fn task_request(body: Value) -> TaskSurveyRequest {
        serde_json::from_value(body).expect("request shape")
    }

    #[test]
    fn assisted_slugs_map_to_form_text() {
        let key = ParticipantKey::new();
        let survey = task_request(json!({
            "preSurveyId": key.to_string(),
            "taskNumber": 2,
            "accuracy": "some-made-sense",
            "helpfulness": "very-helpful"
        }))
        .into_survey()
        .expect("valid");
        assert_eq!(survey.ai_accuracy, Some(AiAccuracy::SomeMadeSense));
        let json = serde_json::to_value(&survey).expect("serialize");
        assert_eq!(
            json["aiHelpfulness"],
            "Very helpful — The suggestions pushed me in new directions"
        );
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn baseline_task_requires_confidence_and_difficulty() {
        let key = ParticipantKey::new();
        let err = task_request(json!({
            "preSurveyId": key.to_string(),
            "taskNumber": 1,
            "accuracy": "highly-logical",
            "helpfulness": "not-helpful"
        }))
        .into_survey()
        .expect_err("wrong answers for baseline");
        match err {
            ApiError::Validation(errors) => assert_eq!(
                errors,
                vec![
                    "confidence is required".to_string(),
                    "difficulty is required".to_string()
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_task_number_is_rejected() {
        let key = ParticipantKey::new();
        let err = task_request(json!({ "preSurveyId": key.to_string(), "taskNumber": 5 }))
            .into_survey()
            .expect_err("task 5");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn update_rejects_unknown_answers() {
        let request: AiAnswersRequest =
            serde_json::from_value(json!({ "aiAccuracy": "sort of" })).expect("request shape");
        assert!(matches!(
            request.into_update(),
            Err(ApiError::Validation(errors)) if errors.len() == 1
        ));

        let request: AiAnswersRequest = serde_json::from_value(json!({
            "aiHelpfulness": "Moderately helpful — The ideas helped me brainstorm better"
        }))
        .expect("request shape");
        let update = request.into_update().expect("full text accepted");
        assert_eq!(update.ai_helpfulness, Some(AiHelpfulness::ModeratelyHelpful));
        assert_eq!(update.ai_accuracy, None);
    }

    #[test]
    fn post_survey_collects_missing_fields() {
        let key = ParticipantKey::new();
        let request: PostSurveyRequest = serde_json::from_value(json!({
            "preSurveyId": key.to_string(),
            "accuracy": "4",
            "helpfulness": "3",
            "inspiration": " ",
            "problems": "none"
        }))
        .expect("request shape");
        match request.into_survey() {
            Err(ApiError::Validation(errors)) => assert_eq!(
                errors,
                vec![
                    "inspiration is required".to_string(),
                    "expansion is required".to_string(),
                    "recombination is required".to_string()
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
