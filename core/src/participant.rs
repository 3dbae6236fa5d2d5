//! Participant intake (pre-survey) records.
//!
//! The intake record's id is the participant key every other record refers to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique reference to one participant's intake record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantKey(Uuid);

impl ParticipantKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ParticipantKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ParticipantKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Prior experience with AI tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiExperience {
    #[serde(rename = "none")]
    None,
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesignExperience {
    #[serde(rename = "None")]
    NoExperience,
    #[serde(rename = "Some")]
    SomeExperience,
    Extensive,
}

/// Self-rated familiarity on a 1–5 scale, stored as its digit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Familiarity(u8);

impl Familiarity {
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<String> for Familiarity {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("familiarity must be one of 1-5, got '{raw}'"))
    }
}

impl From<Familiarity> for String {
    fn from(value: Familiarity) -> Self {
        value.0.to_string()
    }
}

/// Answers collected by the intake form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeAnswers {
    pub age: String,
    pub gender: Gender,
    pub race: String,
    pub experience: AiExperience,
    pub design_experience: DesignExperience,
    pub healthcare_familiarity: Familiarity,
    pub automation_familiarity: Familiarity,
    pub smart_devices_familiarity: Familiarity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: ParticipantKey,
    #[serde(flatten)]
    pub answers: IntakeAnswers,
    pub created_at: DateTime<Utc>,
}

impl IntakeRecord {
    pub fn new(answers: IntakeAnswers) -> Self {
        Self {
            id: ParticipantKey::new(),
            answers,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn intake_deserializes_form_values() {
        let json = serde_json::json!({
            "age": "25-34",
            "gender": "female",
            "race": "Asian",
            "experience": "none",
            "designExperience": "Some",
            "healthcareFamiliarity": "3",
            "automationFamiliarity": "5",
            "smartDevicesFamiliarity": "1"
        });
        let answers: IntakeAnswers = serde_json::from_value(json).expect("valid answers");
        assert_eq!(answers.experience, AiExperience::None);
        assert_eq!(answers.design_experience, DesignExperience::SomeExperience);
        assert_eq!(answers.automation_familiarity.value(), 5);

        let back = serde_json::to_value(&answers).expect("serialize");
        assert_eq!(back["healthcareFamiliarity"], "3");
        assert_eq!(back["designExperience"], "Some");
    }

    #[test]
    fn familiarity_rejects_out_of_range() {
        assert!(Familiarity::try_from("0".to_string()).is_err());
        assert!(Familiarity::try_from("6".to_string()).is_err());
        assert!(Familiarity::try_from("abc".to_string()).is_err());
        assert_eq!(Familiarity::try_from(" 4 ".to_string()).map(|f| f.value()), Ok(4));
    }

    #[test]
    fn participant_key_parses_uuid_text() {
        let key = ParticipantKey::new();
        let parsed: ParticipantKey = key.to_string().parse().expect("parse");
        assert_eq!(parsed, key);
        assert!("not-an-id".parse::<ParticipantKey>().is_err());
    }
}
