//! Store contracts.
//!
//! Persistence backends implement these traits; the engine and the HTTP layer
//! only ever see them through an explicitly constructed handle.

use async_trait::async_trait;
use thiserror::Error;

use crate::RecordId;
use crate::assignment::AssignmentRecord;
use crate::item::{Category, Item, ItemId};
use crate::participant::{IntakeRecord, ParticipantKey};
use crate::survey::{AiAnswersUpdate, BrainstormResponse, PostSurvey, TaskPostSurvey};
use crate::transcript::ChatTranscriptRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A stored row could not be turned back into a domain value
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of a create-if-absent write keyed on participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    /// The record now stored for the participant (ours or the earlier winner)
    pub record: AssignmentRecord,
    pub was_new: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator contracts
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn list_all_items(&self) -> StoreResult<Vec<Item>>;

    /// Fetch items by id. Missing ids are skipped; order is unspecified.
    async fn get_items(&self, ids: &[ItemId]) -> StoreResult<Vec<Item>>;

    async fn items_by_category(&self, category: Category) -> StoreResult<Vec<Item>> {
        let mut items = self.list_all_items().await?;
        items.retain(|item| item.category == category);
        Ok(items)
    }

    /// Replace the whole catalogue atomically. Returns the number stored.
    async fn replace_all_items(&self, items: Vec<Item>) -> StoreResult<usize>;
}

#[async_trait]
pub trait IntakeStore: Send + Sync {
    async fn intake_exists(&self, key: ParticipantKey) -> StoreResult<bool>;

    async fn insert_intake(&self, record: &IntakeRecord) -> StoreResult<()>;

    async fn get_intake(&self, key: ParticipantKey) -> StoreResult<Option<IntakeRecord>>;

    /// All intake records, oldest first.
    async fn list_intakes(&self) -> StoreResult<Vec<IntakeRecord>>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn find_by_participant_key(
        &self,
        key: ParticipantKey,
    ) -> StoreResult<Option<AssignmentRecord>>;

    /// Insert unless a record already exists for the participant, in which
    /// case the stored record is returned untouched.
    async fn create_if_absent(&self, record: AssignmentRecord) -> StoreResult<CreateOutcome>;

    async fn list_assignments(&self) -> StoreResult<Vec<AssignmentRecord>>;
}

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn insert_transcript(&self, record: &ChatTranscriptRecord) -> StoreResult<()>;

    /// Transcripts for a participant in insertion order.
    async fn transcripts_for(&self, key: ParticipantKey)
    -> StoreResult<Vec<ChatTranscriptRecord>>;
}

#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn insert_brainstorm(&self, response: &BrainstormResponse) -> StoreResult<()>;

    async fn brainstorms_for(&self, key: ParticipantKey) -> StoreResult<Vec<BrainstormResponse>>;

    async fn insert_task_survey(&self, survey: &TaskPostSurvey) -> StoreResult<()>;

    /// Newest first.
    async fn list_task_surveys(&self) -> StoreResult<Vec<TaskPostSurvey>>;

    async fn get_task_survey(&self, id: RecordId) -> StoreResult<Option<TaskPostSurvey>>;

    async fn task_surveys_for(&self, key: ParticipantKey) -> StoreResult<Vec<TaskPostSurvey>>;

    /// Returns the updated survey, `None` when the id is unknown.
    async fn update_task_survey(
        &self,
        id: RecordId,
        update: &AiAnswersUpdate,
    ) -> StoreResult<Option<TaskPostSurvey>>;

    /// Returns the deleted survey, `None` when the id is unknown.
    async fn delete_task_survey(&self, id: RecordId) -> StoreResult<Option<TaskPostSurvey>>;

    async fn insert_post_survey(&self, survey: &PostSurvey) -> StoreResult<()>;

    async fn post_survey_for(&self, key: ParticipantKey) -> StoreResult<Option<PostSurvey>>;
}

/// Everything the service needs from one backend handle.
#[async_trait]
pub trait StudyStore:
    ItemStore + IntakeStore + AssignmentStore + TranscriptStore + SurveyStore
{
    /// Cheap liveness probe of the backend.
    async fn ping(&self) -> StoreResult<()>;
}
