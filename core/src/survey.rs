//! Survey and brainstorm answers.
//!
//! The task post-survey client posts short slugs; the stored value is the
//! full answer text shown on the form. Each scale below keeps both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordId;
use crate::participant::ParticipantKey;
use crate::task::TaskNumber;

macro_rules! answer_scale {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($slug:literal, $text:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn slug(&self) -> &'static str {
                match self {
                    $(Self::$variant => $slug),+
                }
            }

            pub fn text(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn from_slug(slug: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.slug() == slug.trim())
            }

            pub fn from_text(text: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.text() == text.trim())
            }

            /// Accept either the slug or the full answer text.
            pub fn parse(raw: &str) -> Option<Self> {
                Self::from_slug(raw).or_else(|| Self::from_text(raw))
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::parse(&raw).ok_or_else(|| {
                    format!("'{raw}' is not a valid {} answer", stringify!($name))
                })
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.text().to_string()
            }
        }
    };
}

answer_scale! {
    /// How accurate the AI suggestions seemed (tasks 2–4).
    AiAccuracy {
        MostlyIncorrect => ("mostly-incorrect", "The suggestions were mostly incorrect or irrelevant"),
        SomeMadeSense => ("some-made-sense", "Some suggestions made sense, but others seemed off"),
        GenerallyReasonable => ("generally-reasonable", "The suggestions were generally reasonable and plausible"),
        MostlyClearAccurate => ("mostly-clear-accurate", "Most suggestions were clear and accurate"),
        HighlyLogical => ("highly-logical", "All suggestions were highly logical and well-grounded"),
    }
}

answer_scale! {
    /// How helpful the AI suggestions were (tasks 2–4).
    AiHelpfulness {
        NotHelpful => ("not-helpful", "Not helpful at all — I didn't use any of the AI suggestions"),
        SlightlyHelpful => ("slightly-helpful", "Slightly helpful — One or two ideas gave me a small nudge"),
        ModeratelyHelpful => ("moderately-helpful", "Moderately helpful — The ideas helped me brainstorm better"),
        VeryHelpful => ("very-helpful", "Very helpful — The suggestions pushed me in new directions"),
        ExtremelyHelpful => ("extremely-helpful", "Extremely helpful — The AI greatly enhanced my creativity"),
    }
}

answer_scale! {
    /// Confidence in one's own ideas (task 1).
    Confidence {
        NotConfident => ("not-confident", "Not confident at all — My ideas were basic or unoriginal"),
        SlightlyConfident => ("slightly-confident", "Slightly confident — I had some decent ideas but nothing special"),
        ModeratelyConfident => ("moderately-confident", "Moderately confident — My ideas were reasonably creative and useful"),
        VeryConfident => ("very-confident", "Very confident — I came up with some innovative and practical ideas"),
        ExtremelyConfident => ("extremely-confident", "Extremely confident — My ideas were highly creative and groundbreaking"),
    }
}

answer_scale! {
    /// Perceived difficulty of the baseline task (task 1).
    Difficulty {
        VeryEasy => ("very-easy", "Very easy — Ideas came to me naturally and quickly"),
        SomewhatEasy => ("somewhat-easy", "Somewhat easy — I could think of ideas without much struggle"),
        Moderate => ("moderate", "Moderate — Required some thinking but manageable"),
        SomewhatDifficult => ("somewhat-difficult", "Somewhat difficult — Had to work hard to come up with good ideas"),
        VeryDifficult => ("very-difficult", "Very difficult — Struggled significantly to generate ideas"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task post-survey
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPostSurvey {
    pub id: RecordId,
    pub participant_key: ParticipantKey,
    pub task_number: TaskNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_accuracy: Option<AiAccuracy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_helpfulness: Option<AiHelpfulness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Answers for one task survey, shaped by task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSurveyAnswers {
    Baseline {
        confidence: Confidence,
        difficulty: Difficulty,
    },
    Assisted {
        accuracy: AiAccuracy,
        helpfulness: AiHelpfulness,
    },
}

impl TaskPostSurvey {
    /// Build a survey. Returns `None` when the answer kind does not match the
    /// task (baseline answers for an assisted task or the reverse).
    pub fn new(
        participant_key: ParticipantKey,
        task_number: TaskNumber,
        answers: TaskSurveyAnswers,
    ) -> Option<Self> {
        let now = Utc::now();
        let mut survey = Self {
            id: RecordId::new(),
            participant_key,
            task_number,
            ai_accuracy: None,
            ai_helpfulness: None,
            confidence: None,
            difficulty: None,
            created_at: now,
            updated_at: now,
        };
        match (task_number.is_baseline(), answers) {
            (true, TaskSurveyAnswers::Baseline { confidence, difficulty }) => {
                survey.confidence = Some(confidence);
                survey.difficulty = Some(difficulty);
            }
            (false, TaskSurveyAnswers::Assisted { accuracy, helpfulness }) => {
                survey.ai_accuracy = Some(accuracy);
                survey.ai_helpfulness = Some(helpfulness);
            }
            _ => return None,
        }
        Some(survey)
    }

    pub fn apply(&mut self, update: &AiAnswersUpdate) {
        if let Some(accuracy) = update.ai_accuracy {
            self.ai_accuracy = Some(accuracy);
        }
        if let Some(helpfulness) = update.ai_helpfulness {
            self.ai_helpfulness = Some(helpfulness);
        }
        self.updated_at = Utc::now();
    }
}

/// Edit of the AI answers on an existing task survey. Absent fields are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnswersUpdate {
    #[serde(default)]
    pub ai_accuracy: Option<AiAccuracy>,
    #[serde(default)]
    pub ai_helpfulness: Option<AiHelpfulness>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Final post-survey
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSurvey {
    pub id: RecordId,
    pub participant_key: ParticipantKey,
    pub accuracy: String,
    pub helpfulness: String,
    pub inspiration: String,
    pub expansion: String,
    pub recombination: String,
    #[serde(default)]
    pub problems: Option<String>,
    #[serde(default)]
    pub improvements: Option<String>,
    #[serde(default)]
    pub agree_to_terms: Option<bool>,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Brainstorm responses
// ─────────────────────────────────────────────────────────────────────────────

/// Which brainstorming form produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainstormKind {
    /// Unassisted ideas from the baseline task
    Baseline,
    /// Ideas written alongside the chat assistant
    Assisted,
}

impl BrainstormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Assisted => "assisted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "baseline" => Some(Self::Baseline),
            "assisted" => Some(Self::Assisted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCase {
    #[serde(rename = "use", default)]
    pub idea: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainstormResponse {
    pub id: RecordId,
    pub participant_key: ParticipantKey,
    pub kind: BrainstormKind,
    pub use_cases: Vec<UseCase>,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub task: Option<TaskNumber>,
    #[serde(default)]
    pub temperature: Option<f64>,
    pub created_at: DateTime<Utc>,
}
