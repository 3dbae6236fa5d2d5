//! Row decoding.
//!
//! Rows are first read as plain column values, then decoded into domain types
//! in a second step so that malformed data surfaces as `DbError::Corrupt`
//! rather than as a SQLite type error.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use study_core::RecordId;
use study_core::assignment::AssignmentRow;
use study_core::item::{Category, Item, ItemId, Level, PatentStatus, SeverityVariants};
use study_core::participant::{IntakeAnswers, IntakeRecord, ParticipantKey};
use study_core::survey::{BrainstormKind, BrainstormResponse, PostSurvey, TaskPostSurvey, UseCase};
use study_core::task::TaskNumber;
use study_core::{AssignmentRecord, ChatEntry, ChatTranscriptRecord};

use super::{DbError, Result};

fn corrupt(what: &str, detail: impl std::fmt::Display) -> DbError {
    DbError::Corrupt(format!("{what}: {detail}"))
}

fn parse_uuid(what: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| corrupt(what, format!("'{raw}' ({e})")))
}

fn timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", format!("'{raw}' ({e})")))
}

fn item_id(raw: &str) -> Result<ItemId> {
    parse_uuid("assigned item", raw).map(ItemId::from_uuid)
}

fn category(raw: &str) -> Result<Category> {
    Category::parse(raw).ok_or_else(|| corrupt("category", raw))
}

fn level(raw: &str) -> Result<Level> {
    Level::parse(raw).ok_or_else(|| corrupt("level", raw))
}

fn task(raw: i64) -> Result<TaskNumber> {
    TaskNumber::new(raw).map_err(|e| corrupt("task", e))
}

fn round(raw: Option<i64>) -> Result<Option<u32>> {
    raw.map(|r| u32::try_from(r).map_err(|e| corrupt("round", e)))
        .transpose()
}

fn answer<T: TryFrom<String, Error = String>>(raw: Option<String>) -> Result<Option<T>> {
    raw.map(|text| T::try_from(text).map_err(|e| corrupt("survey answer", e)))
        .transpose()
}

// ─────────────────────────────────────────────────────────────────────────────
// items
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const ITEM_COLUMNS: &str = "id, category, category_order, classifications, name, \
     link, description, status, year, level_low, level_medium, level_high";

pub(crate) struct RawItem {
    id: String,
    category: String,
    category_order: i64,
    classifications: String,
    name: String,
    link: String,
    description: String,
    status: String,
    year: Option<i32>,
    low: String,
    medium: String,
    high: String,
}

impl RawItem {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category: row.get(1)?,
            category_order: row.get(2)?,
            classifications: row.get(3)?,
            name: row.get(4)?,
            link: row.get(5)?,
            description: row.get(6)?,
            status: row.get(7)?,
            year: row.get(8)?,
            low: row.get(9)?,
            medium: row.get(10)?,
            high: row.get(11)?,
        })
    }

    pub(crate) fn decode(self) -> Result<Item> {
        Ok(Item {
            id: ItemId::from_uuid(parse_uuid("item id", &self.id)?),
            category: category(&self.category)?,
            category_order: self.category_order,
            classifications: self.classifications,
            name: self.name,
            link: self.link,
            description: self.description,
            status: PatentStatus::parse(&self.status)
                .ok_or_else(|| corrupt("patent status", &self.status))?,
            year: self.year,
            severity_variants: SeverityVariants {
                low: self.low,
                medium: self.medium,
                high: self.high,
            },
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// intakes
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct RawIntake {
    id: String,
    answers_json: String,
    created_at: String,
}

impl RawIntake {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            answers_json: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    pub(crate) fn decode(self) -> Result<IntakeRecord> {
        let answers: IntakeAnswers =
            serde_json::from_str(&self.answers_json).map_err(|e| corrupt("intake answers", e))?;
        Ok(IntakeRecord {
            id: ParticipantKey::from_uuid(parse_uuid("participant key", &self.id)?),
            answers,
            created_at: timestamp(&self.created_at)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// assignments
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const ASSIGNMENT_COLUMNS: &str = "participant_key, task1_item, task2_item, \
     task3_item, task4_item, task2_category, task3_category, task4_category, task2_level, \
     task3_level, task4_level, created_at";

pub(crate) struct RawAssignment {
    participant_key: String,
    items: [String; 4],
    categories: [String; 3],
    levels: [String; 3],
    created_at: String,
}

impl RawAssignment {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            participant_key: row.get(0)?,
            items: [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
            categories: [row.get(5)?, row.get(6)?, row.get(7)?],
            levels: [row.get(8)?, row.get(9)?, row.get(10)?],
            created_at: row.get(11)?,
        })
    }

    pub(crate) fn decode(self) -> Result<AssignmentRecord> {
        let [i1, i2, i3, i4] = &self.items;
        let [c2, c3, c4] = &self.categories;
        let [l2, l3, l4] = &self.levels;
        let row = AssignmentRow {
            participant_key: ParticipantKey::from_uuid(parse_uuid(
                "participant key",
                &self.participant_key,
            )?),
            task1_item: item_id(i1)?,
            task2_item: item_id(i2)?,
            task3_item: item_id(i3)?,
            task4_item: item_id(i4)?,
            task2_category: category(c2)?,
            task3_category: category(c3)?,
            task4_category: category(c4)?,
            task2_level: level(l2)?,
            task3_level: level(l3)?,
            task4_level: level(l4)?,
            created_at: timestamp(&self.created_at)?,
        };
        AssignmentRecord::try_from(row).map_err(|e| corrupt("assignment", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// transcripts
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const TRANSCRIPT_COLUMNS: &str =
    "id, participant_key, task, round, level, entries_json, created_at";

pub(crate) struct RawTranscript {
    id: String,
    participant_key: String,
    task: i64,
    round: Option<i64>,
    level: Option<String>,
    entries_json: String,
    created_at: String,
}

impl RawTranscript {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            participant_key: row.get(1)?,
            task: row.get(2)?,
            round: row.get(3)?,
            level: row.get(4)?,
            entries_json: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub(crate) fn decode(self) -> Result<ChatTranscriptRecord> {
        let entries: Vec<ChatEntry> =
            serde_json::from_str(&self.entries_json).map_err(|e| corrupt("chat entries", e))?;
        Ok(ChatTranscriptRecord {
            id: RecordId::from_uuid(parse_uuid("transcript id", &self.id)?),
            participant_key: ParticipantKey::from_uuid(parse_uuid(
                "participant key",
                &self.participant_key,
            )?),
            task: task(self.task)?,
            round: round(self.round)?,
            level: self.level.as_deref().map(level).transpose()?,
            entries,
            created_at: timestamp(&self.created_at)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// brainstorms
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const BRAINSTORM_COLUMNS: &str =
    "id, participant_key, kind, use_cases_json, round, object, task, temperature, created_at";

pub(crate) struct RawBrainstorm {
    id: String,
    participant_key: String,
    kind: String,
    use_cases_json: String,
    round: Option<i64>,
    object: Option<String>,
    task: Option<i64>,
    temperature: Option<f64>,
    created_at: String,
}

impl RawBrainstorm {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            participant_key: row.get(1)?,
            kind: row.get(2)?,
            use_cases_json: row.get(3)?,
            round: row.get(4)?,
            object: row.get(5)?,
            task: row.get(6)?,
            temperature: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub(crate) fn decode(self) -> Result<BrainstormResponse> {
        let use_cases: Vec<UseCase> =
            serde_json::from_str(&self.use_cases_json).map_err(|e| corrupt("use cases", e))?;
        Ok(BrainstormResponse {
            id: RecordId::from_uuid(parse_uuid("brainstorm id", &self.id)?),
            participant_key: ParticipantKey::from_uuid(parse_uuid(
                "participant key",
                &self.participant_key,
            )?),
            kind: BrainstormKind::parse(&self.kind)
                .ok_or_else(|| corrupt("brainstorm kind", &self.kind))?,
            use_cases,
            round: round(self.round)?,
            object: self.object,
            task: self.task.map(task).transpose()?,
            temperature: self.temperature,
            created_at: timestamp(&self.created_at)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// task surveys
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const TASK_SURVEY_COLUMNS: &str = "id, participant_key, task_number, ai_accuracy, \
     ai_helpfulness, confidence, difficulty, created_at, updated_at";

pub(crate) struct RawTaskSurvey {
    id: String,
    participant_key: String,
    task_number: i64,
    ai_accuracy: Option<String>,
    ai_helpfulness: Option<String>,
    confidence: Option<String>,
    difficulty: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawTaskSurvey {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            participant_key: row.get(1)?,
            task_number: row.get(2)?,
            ai_accuracy: row.get(3)?,
            ai_helpfulness: row.get(4)?,
            confidence: row.get(5)?,
            difficulty: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    pub(crate) fn decode(self) -> Result<TaskPostSurvey> {
        Ok(TaskPostSurvey {
            id: RecordId::from_uuid(parse_uuid("task survey id", &self.id)?),
            participant_key: ParticipantKey::from_uuid(parse_uuid(
                "participant key",
                &self.participant_key,
            )?),
            task_number: task(self.task_number)?,
            ai_accuracy: answer(self.ai_accuracy)?,
            ai_helpfulness: answer(self.ai_helpfulness)?,
            confidence: answer(self.confidence)?,
            difficulty: answer(self.difficulty)?,
            created_at: timestamp(&self.created_at)?,
            updated_at: timestamp(&self.updated_at)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// post surveys
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const POST_SURVEY_COLUMNS: &str = "id, participant_key, accuracy, helpfulness, \
     inspiration, expansion, recombination, problems, improvements, agree_to_terms, created_at";

pub(crate) struct RawPostSurvey {
    id: String,
    participant_key: String,
    accuracy: String,
    helpfulness: String,
    inspiration: String,
    expansion: String,
    recombination: String,
    problems: Option<String>,
    improvements: Option<String>,
    agree_to_terms: Option<bool>,
    created_at: String,
}

impl RawPostSurvey {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            participant_key: row.get(1)?,
            accuracy: row.get(2)?,
            helpfulness: row.get(3)?,
            inspiration: row.get(4)?,
            expansion: row.get(5)?,
            recombination: row.get(6)?,
            problems: row.get(7)?,
            improvements: row.get(8)?,
            agree_to_terms: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    pub(crate) fn decode(self) -> Result<PostSurvey> {
        Ok(PostSurvey {
            id: RecordId::from_uuid(parse_uuid("post survey id", &self.id)?),
            participant_key: ParticipantKey::from_uuid(parse_uuid(
                "participant key",
                &self.participant_key,
            )?),
            accuracy: self.accuracy,
            helpfulness: self.helpfulness,
            inspiration: self.inspiration,
            expansion: self.expansion,
            recombination: self.recombination,
            problems: self.problems,
            improvements: self.improvements,
            agree_to_terms: self.agree_to_terms,
            created_at: timestamp(&self.created_at)?,
        })
    }
}
