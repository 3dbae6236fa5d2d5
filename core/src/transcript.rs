//! Chat transcripts from the brainstorming tasks.
//!
//! The severity level on a transcript always comes from the participant's
//! stored assignment. A level sent by the client is logged when it disagrees
//! and then dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::RecordId;
use crate::errors::{Result, StudyError};
use crate::item::Level;
use crate::participant::ParticipantKey;
use crate::store::{AssignmentStore, IntakeStore, TranscriptStore};
use crate::task::TaskNumber;

/// One chat bubble as rendered by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub direction: String,
    #[serde(default, alias = "message")]
    pub text: String,
}

impl ChatEntry {
    /// Whether the participant (not the assistant) wrote this entry.
    pub fn is_from_participant(&self) -> bool {
        self.sender.eq_ignore_ascii_case("user") || self.direction.eq_ignore_ascii_case("outgoing")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTranscriptRecord {
    pub id: RecordId,
    pub participant_key: ParticipantKey,
    pub task: TaskNumber,
    pub round: Option<u32>,
    pub level: Option<Level>,
    pub entries: Vec<ChatEntry>,
    pub created_at: DateTime<Utc>,
}

/// What a caller submits. `requested_level` is never stored.
#[derive(Debug, Clone)]
pub struct TranscriptDraft {
    pub participant_key: ParticipantKey,
    pub task: i64,
    pub round: Option<u32>,
    pub entries: Vec<ChatEntry>,
    pub requested_level: Option<Level>,
}

/// Validate and store a transcript, stamping the level from the assignment.
pub async fn append_transcript<S>(store: &S, draft: TranscriptDraft) -> Result<ChatTranscriptRecord>
where
    S: AssignmentStore + IntakeStore + TranscriptStore + ?Sized,
{
    let task = TaskNumber::new(draft.task)?;
    let key = draft.participant_key;

    let (round, level) = if task.is_baseline() {
        if !store.intake_exists(key).await? {
            return Err(StudyError::not_found(format!("participant {key}")));
        }
        (None, None)
    } else {
        let round = match draft.round {
            Some(round) if round >= 1 => round,
            Some(round) => {
                return Err(StudyError::validation(format!(
                    "round must be a positive number, got {round}"
                )));
            }
            None => {
                return Err(StudyError::validation(format!(
                    "round is required for task {task}"
                )));
            }
        };
        let record = store
            .find_by_participant_key(key)
            .await?
            .ok_or_else(|| StudyError::not_found(format!("assignment for participant {key}")))?;
        let level = record.level_for(task).ok_or_else(|| {
            StudyError::invalid_state(format!("assignment for {key} has no level for task {task}"))
        })?;
        (Some(round), Some(level))
    };

    if let Some(requested) = draft.requested_level
        && Some(requested) != level
    {
        warn!(
            participant = %key,
            task = task.get(),
            requested = requested.as_str(),
            "ignoring client-supplied transcript level"
        );
    }

    let record = ChatTranscriptRecord {
        id: RecordId::new(),
        participant_key: key,
        task,
        round,
        level,
        entries: draft.entries,
        created_at: Utc::now(),
    };
    store.insert_transcript(&record).await?;
    debug!(
        participant = %key,
        task = task.get(),
        entries = record.entries.len(),
        "stored transcript"
    );
    Ok(record)
}
