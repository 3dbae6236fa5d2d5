use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use study_core::IntakeAnswers;
use study_core::IntakeRecord;

use super::AppState;
use super::fields;
use crate::error::ApiError;
use crate::error::ApiResult;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IntakeRequest {
    age: Option<String>,
    gender: Option<String>,
    race: Option<String>,
    experience: Option<String>,
    design_experience: Option<String>,
    healthcare_familiarity: Option<String>,
    automation_familiarity: Option<String>,
    smart_devices_familiarity: Option<String>,
}

impl IntakeRequest {
    fn validate(self) -> ApiResult<IntakeAnswers> {
        let mut errors = Vec::new();
        let age = fields::required_text("age", self.age.as_deref(), &mut errors);
        let gender = fields::required_choice("gender", self.gender.as_deref(), &mut errors);
        let race = fields::required_text("race", self.race.as_deref(), &mut errors);
        let experience =
            fields::required_choice("experience", self.experience.as_deref(), &mut errors);
        let design_experience = fields::required_choice(
            "designExperience",
            self.design_experience.as_deref(),
            &mut errors,
        );
        let healthcare_familiarity = fields::required_choice(
            "healthcareFamiliarity",
            self.healthcare_familiarity.as_deref(),
            &mut errors,
        );
        let automation_familiarity = fields::required_choice(
            "automationFamiliarity",
            self.automation_familiarity.as_deref(),
            &mut errors,
        );
        let smart_devices_familiarity = fields::required_choice(
            "smartDevicesFamiliarity",
            self.smart_devices_familiarity.as_deref(),
            &mut errors,
        );

        match (
            age,
            gender,
            race,
            experience,
            design_experience,
            healthcare_familiarity,
            automation_familiarity,
            smart_devices_familiarity,
        ) {
            (
                Some(age),
                Some(gender),
                Some(race),
                Some(experience),
                Some(design_experience),
                Some(healthcare_familiarity),
                Some(automation_familiarity),
                Some(smart_devices_familiarity),
            ) if errors.is_empty() => Ok(IntakeAnswers {
                age,
                gender,
                race,
                experience,
                design_experience,
                healthcare_familiarity,
                automation_familiarity,
                smart_devices_familiarity,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// `POST /api/PreSurvey`
pub(super) async fn create_intake(
    State(state): State<AppState>,
    payload: Result<Json<IntakeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IntakeRecord>)> {
    let Json(request) = payload?;
    let record = IntakeRecord::new(request.validate()?);
    state.store.insert_intake(&record).await?;
    tracing::info!(participant = %record.id, "intake recorded");
    Ok((StatusCode::CREATED, Json(record)))
}
