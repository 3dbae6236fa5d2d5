//! In-memory store used by tests and local experiments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::RecordId;
use crate::assignment::AssignmentRecord;
use crate::item::{Item, ItemId};
use crate::participant::{IntakeRecord, ParticipantKey};
use crate::store::{
    AssignmentStore, CreateOutcome, IntakeStore, ItemStore, StoreResult, StudyStore, SurveyStore,
    TranscriptStore,
};
use crate::survey::{AiAnswersUpdate, BrainstormResponse, PostSurvey, TaskPostSurvey};
use crate::transcript::ChatTranscriptRecord;

#[derive(Default)]
struct Tables {
    items: Vec<Item>,
    intakes: Vec<IntakeRecord>,
    assignments: HashMap<ParticipantKey, AssignmentRecord>,
    transcripts: Vec<ChatTranscriptRecord>,
    brainstorms: Vec<BrainstormResponse>,
    task_surveys: Vec<TaskPostSurvey>,
    post_surveys: Vec<PostSurvey>,
}

/// All tables behind one mutex, so every call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                items,
                ..Tables::default()
            }),
        }
    }

    pub async fn assignment_count(&self) -> usize {
        self.tables.lock().await.assignments.len()
    }

    pub async fn transcript_count(&self) -> usize {
        self.tables.lock().await.transcripts.len()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn list_all_items(&self) -> StoreResult<Vec<Item>> {
        Ok(self.tables.lock().await.items.clone())
    }

    async fn get_items(&self, ids: &[ItemId]) -> StoreResult<Vec<Item>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn replace_all_items(&self, items: Vec<Item>) -> StoreResult<usize> {
        let count = items.len();
        self.tables.lock().await.items = items;
        Ok(count)
    }
}

#[async_trait]
impl IntakeStore for MemoryStore {
    async fn intake_exists(&self, key: ParticipantKey) -> StoreResult<bool> {
        Ok(self.tables.lock().await.intakes.iter().any(|r| r.id == key))
    }

    async fn insert_intake(&self, record: &IntakeRecord) -> StoreResult<()> {
        self.tables.lock().await.intakes.push(record.clone());
        Ok(())
    }

    async fn get_intake(&self, key: ParticipantKey) -> StoreResult<Option<IntakeRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.intakes.iter().find(|r| r.id == key).cloned())
    }

    async fn list_intakes(&self) -> StoreResult<Vec<IntakeRecord>> {
        Ok(self.tables.lock().await.intakes.clone())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn find_by_participant_key(
        &self,
        key: ParticipantKey,
    ) -> StoreResult<Option<AssignmentRecord>> {
        Ok(self.tables.lock().await.assignments.get(&key).cloned())
    }

    async fn create_if_absent(&self, record: AssignmentRecord) -> StoreResult<CreateOutcome> {
        let mut tables = self.tables.lock().await;
        let key = record.participant_key();
        if let Some(existing) = tables.assignments.get(&key) {
            return Ok(CreateOutcome {
                record: existing.clone(),
                was_new: false,
            });
        }
        tables.assignments.insert(key, record.clone());
        Ok(CreateOutcome {
            record,
            was_new: true,
        })
    }

    async fn list_assignments(&self) -> StoreResult<Vec<AssignmentRecord>> {
        let tables = self.tables.lock().await;
        let mut records: Vec<AssignmentRecord> = tables.assignments.values().cloned().collect();
        records.sort_by_key(AssignmentRecord::created_at);
        Ok(records)
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn insert_transcript(&self, record: &ChatTranscriptRecord) -> StoreResult<()> {
        self.tables.lock().await.transcripts.push(record.clone());
        Ok(())
    }

    async fn transcripts_for(
        &self,
        key: ParticipantKey,
    ) -> StoreResult<Vec<ChatTranscriptRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .transcripts
            .iter()
            .filter(|t| t.participant_key == key)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn insert_brainstorm(&self, response: &BrainstormResponse) -> StoreResult<()> {
        self.tables.lock().await.brainstorms.push(response.clone());
        Ok(())
    }

    async fn brainstorms_for(&self, key: ParticipantKey) -> StoreResult<Vec<BrainstormResponse>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .brainstorms
            .iter()
            .filter(|b| b.participant_key == key)
            .cloned()
            .collect())
    }

    async fn insert_task_survey(&self, survey: &TaskPostSurvey) -> StoreResult<()> {
        self.tables.lock().await.task_surveys.push(survey.clone());
        Ok(())
    }

    async fn list_task_surveys(&self) -> StoreResult<Vec<TaskPostSurvey>> {
        let tables = self.tables.lock().await;
        Ok(tables.task_surveys.iter().rev().cloned().collect())
    }

    async fn get_task_survey(&self, id: RecordId) -> StoreResult<Option<TaskPostSurvey>> {
        let tables = self.tables.lock().await;
        Ok(tables.task_surveys.iter().find(|s| s.id == id).cloned())
    }

    async fn task_surveys_for(&self, key: ParticipantKey) -> StoreResult<Vec<TaskPostSurvey>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .task_surveys
            .iter()
            .filter(|s| s.participant_key == key)
            .cloned()
            .collect())
    }

    async fn update_task_survey(
        &self,
        id: RecordId,
        update: &AiAnswersUpdate,
    ) -> StoreResult<Option<TaskPostSurvey>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .task_surveys
            .iter_mut()
            .find(|s| s.id == id)
            .map(|survey| {
                survey.apply(update);
                survey.clone()
            }))
    }

    async fn delete_task_survey(&self, id: RecordId) -> StoreResult<Option<TaskPostSurvey>> {
        let mut tables = self.tables.lock().await;
        let position = tables.task_surveys.iter().position(|s| s.id == id);
        Ok(position.map(|i| tables.task_surveys.remove(i)))
    }

    async fn insert_post_survey(&self, survey: &PostSurvey) -> StoreResult<()> {
        self.tables.lock().await.post_surveys.push(survey.clone());
        Ok(())
    }

    async fn post_survey_for(&self, key: ParticipantKey) -> StoreResult<Option<PostSurvey>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .post_surveys
            .iter()
            .rev()
            .find(|s| s.participant_key == key)
            .cloned())
    }
}

#[async_trait]
impl StudyStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
