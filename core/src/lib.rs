//! Domain model and assignment engine for the patent ideation study.
//!
//! The crate owns the data-shape contracts (items, intake, assignments,
//! transcripts, surveys), the store traits persistence backends implement,
//! and the engine that assigns patents and stamps transcript levels.

pub mod assignment;
pub mod errors;
pub mod item;
pub mod memory_store;
pub mod participant;
pub mod store;
pub mod survey;
pub mod task;
pub mod transcript;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use assignment::{
    AssignmentDraw, AssignmentEngine, AssignmentOutcome, AssignmentRecord, ResolvedAssignment,
    TaskAssignment, TaskSlot, draw_assignment,
};
pub use errors::{ErrorCategory, PoolShortfall, Result, StudyError};
pub use item::{Category, Item, ItemId, Level, PatentStatus, SeverityVariants};
pub use memory_store::MemoryStore;
pub use participant::{IntakeAnswers, IntakeRecord, ParticipantKey};
pub use store::{CreateOutcome, StoreError, StudyStore};
pub use task::TaskNumber;
pub use transcript::{ChatEntry, ChatTranscriptRecord, TranscriptDraft, append_transcript};

/// Identifier for stored records that are not keyed by participant
/// (transcripts, survey answers, brainstorm responses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
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

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}
