//! End-to-end engine behaviour against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;
use study_core::participant::{
    AiExperience, DesignExperience, Familiarity, Gender, IntakeAnswers,
};
use study_core::store::{
    AssignmentStore, CreateOutcome, IntakeStore, ItemStore, StoreResult, TranscriptStore,
};
use study_core::{
    AssignmentEngine, AssignmentRecord, Category, ChatEntry, IntakeRecord, Item, ItemId, Level,
    MemoryStore, ParticipantKey, PatentStatus, PoolShortfall, SeverityVariants, StudyError,
    TranscriptDraft, append_transcript,
};
use tokio::sync::Barrier;

fn item(category: Category, order: i64, name: &str) -> Item {
    Item {
        id: ItemId::new(),
        category,
        category_order: order,
        classifications: String::new(),
        name: name.to_string(),
        link: format!("https://patents.example/{name}"),
        description: format!("{name} description"),
        status: PatentStatus::Active,
        year: Some(2020),
        severity_variants: SeverityVariants {
            low: format!("{name} low"),
            medium: format!("{name} medium"),
            high: format!("{name} high"),
        },
    }
}

fn pool_3_2_2() -> Vec<Item> {
    vec![
        item(Category::SmartContainers, 0, "A1"),
        item(Category::SmartContainers, 0, "A2"),
        item(Category::SmartContainers, 0, "A3"),
        item(Category::Healthcare, 1, "B1"),
        item(Category::Healthcare, 1, "B2"),
        item(Category::Automation, 2, "C1"),
        item(Category::Automation, 2, "C2"),
    ]
}

fn answers() -> IntakeAnswers {
    IntakeAnswers {
        age: "25-34".to_string(),
        gender: Gender::Other,
        race: "Prefer not to say".to_string(),
        experience: AiExperience::Intermediate,
        design_experience: DesignExperience::SomeExperience,
        healthcare_familiarity: Familiarity::new(2).unwrap(),
        automation_familiarity: Familiarity::new(4).unwrap(),
        smart_devices_familiarity: Familiarity::new(3).unwrap(),
    }
}

async fn enrolled(store: &MemoryStore) -> ParticipantKey {
    let intake = IntakeRecord::new(answers());
    store.insert_intake(&intake).await.unwrap();
    intake.id
}

#[tokio::test]
async fn end_to_end_with_three_two_two_pool() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let key = enrolled(&store).await;
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let outcome = engine.get_or_create_seeded(key, 11).await.unwrap();
    assert!(outcome.created);
    let resolved = outcome.assignment;

    let slot_categories: HashSet<Category> =
        resolved.slot_items.iter().map(|item| item.category).collect();
    assert_eq!(slot_categories.len(), 3);
    for (slot, item) in resolved.record.slots().iter().zip(&resolved.slot_items) {
        assert_eq!(slot.item, item.id);
        assert_eq!(slot.category, item.category);
        assert_ne!(item.id, resolved.task1_item.id);
    }

    let json = serde_json::to_value(&resolved).unwrap();
    assert_eq!(json["task1Item"]["name"], resolved.task1_item.name.as_str());
    assert!(json["task2Level"].is_string());
}

#[tokio::test]
async fn repeated_calls_return_the_same_record() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let key = enrolled(&store).await;
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let first = engine.get_or_create(key).await.unwrap();
    for _ in 0..5 {
        let again = engine.get_or_create(key).await.unwrap();
        assert!(!again.created);
        assert_eq!(again.assignment, first.assignment);
    }
    assert_eq!(store.assignment_count().await, 1);
    assert_eq!(engine.get_assignment(key).await.unwrap(), first.assignment);
}

#[tokio::test]
async fn unknown_participant_is_not_found() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let err = engine.get_or_create(ParticipantKey::new()).await.unwrap_err();
    assert!(matches!(err, StudyError::NotFound { .. }));
    assert_eq!(store.assignment_count().await, 0);
}

#[tokio::test]
async fn three_item_pool_persists_nothing() {
    let store = Arc::new(MemoryStore::with_items(
        pool_3_2_2().into_iter().skip(2).take(3).collect(),
    ));
    let key = enrolled(&store).await;
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let err = engine.get_or_create(key).await.unwrap_err();
    assert!(matches!(
        err,
        StudyError::InsufficientPool(PoolShortfall::TooFewItems { available: 3 })
    ));
    assert_eq!(store.assignment_count().await, 0);
}

#[tokio::test]
async fn empty_category_persists_nothing() {
    let pool = vec![
        item(Category::SmartContainers, 0, "A1"),
        item(Category::SmartContainers, 0, "A2"),
        item(Category::Healthcare, 1, "B1"),
        item(Category::Healthcare, 1, "B2"),
    ];
    let store = Arc::new(MemoryStore::with_items(pool));
    let key = enrolled(&store).await;
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let err = engine.get_or_create(key).await.unwrap_err();
    assert!(matches!(
        err,
        StudyError::InsufficientPool(PoolShortfall::EmptyCategory {
            category: Category::Automation
        })
    ));
    assert_eq!(store.assignment_count().await, 0);
}

#[tokio::test]
async fn task_lookup_validates_task_before_store() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let engine = AssignmentEngine::new(Arc::clone(&store));

    // No assignment exists, but the task number is checked first.
    let err = engine
        .get_assignment_for_task(ParticipantKey::new(), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::InvalidTask { task: 5 }));

    let err = engine
        .get_assignment_for_task(ParticipantKey::new(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::NotFound { .. }));
}

#[tokio::test]
async fn task_lookup_returns_item_and_level() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let key = enrolled(&store).await;
    let engine = AssignmentEngine::new(Arc::clone(&store));
    let resolved = engine.get_or_create(key).await.unwrap().assignment;

    let baseline = engine.get_assignment_for_task(key, 1).await.unwrap();
    assert_eq!(baseline.item, resolved.task1_item);
    assert_eq!(baseline.level, None);

    let mut levels = Vec::new();
    for (task, slot) in (2..=4).zip(resolved.record.slots()) {
        let assigned = engine.get_assignment_for_task(key, task).await.unwrap();
        assert_eq!(assigned.item.id, slot.item);
        assert_eq!(assigned.level, Some(slot.level));
        levels.push(slot.level);
    }
    levels.sort();
    assert_eq!(levels, Level::ALL.to_vec());
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrent creation
// ─────────────────────────────────────────────────────────────────────────────

/// Holds the first two lookups at a barrier so both callers see no record
/// before either writes.
struct RacingStore {
    inner: MemoryStore,
    barrier: Barrier,
    lookups: AtomicUsize,
}

#[async_trait]
impl ItemStore for RacingStore {
    async fn list_all_items(&self) -> StoreResult<Vec<Item>> {
        self.inner.list_all_items().await
    }

    async fn get_items(&self, ids: &[ItemId]) -> StoreResult<Vec<Item>> {
        self.inner.get_items(ids).await
    }

    async fn replace_all_items(&self, items: Vec<Item>) -> StoreResult<usize> {
        self.inner.replace_all_items(items).await
    }
}

#[async_trait]
impl IntakeStore for RacingStore {
    async fn intake_exists(&self, key: ParticipantKey) -> StoreResult<bool> {
        self.inner.intake_exists(key).await
    }

    async fn insert_intake(&self, record: &IntakeRecord) -> StoreResult<()> {
        self.inner.insert_intake(record).await
    }

    async fn get_intake(&self, key: ParticipantKey) -> StoreResult<Option<IntakeRecord>> {
        self.inner.get_intake(key).await
    }

    async fn list_intakes(&self) -> StoreResult<Vec<IntakeRecord>> {
        self.inner.list_intakes().await
    }
}

#[async_trait]
impl AssignmentStore for RacingStore {
    async fn find_by_participant_key(
        &self,
        key: ParticipantKey,
    ) -> StoreResult<Option<AssignmentRecord>> {
        let found = self.inner.find_by_participant_key(key).await?;
        if self.lookups.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        Ok(found)
    }

    async fn create_if_absent(&self, record: AssignmentRecord) -> StoreResult<CreateOutcome> {
        self.inner.create_if_absent(record).await
    }

    async fn list_assignments(&self) -> StoreResult<Vec<AssignmentRecord>> {
        self.inner.list_assignments().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_first_calls_converge_on_one_record() {
    let inner = MemoryStore::with_items(pool_3_2_2());
    let intake = IntakeRecord::new(answers());
    inner.insert_intake(&intake).await.unwrap();
    let key = intake.id;

    let store = Arc::new(RacingStore {
        inner,
        barrier: Barrier::new(2),
        lookups: AtomicUsize::new(0),
    });
    let a = AssignmentEngine::new(Arc::clone(&store));
    let b = a.clone();

    // Different seeds so the two local drafts almost surely differ.
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.get_or_create_seeded(key, 1).await }),
        tokio::spawn(async move { b.get_or_create_seeded(key, 2).await }),
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    assert_eq!(first.assignment, second.assignment);
    assert_eq!(
        [first.created, second.created].iter().filter(|c| **c).count(),
        1
    );
    assert_eq!(store.inner.assignment_count().await, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcript levels
// ─────────────────────────────────────────────────────────────────────────────

fn entries() -> Vec<ChatEntry> {
    vec![
        ChatEntry {
            sender: "user".to_string(),
            direction: "outgoing".to_string(),
            text: "ideas for a smart bottle?".to_string(),
        },
        ChatEntry {
            sender: "ChatGPT".to_string(),
            direction: "incoming".to_string(),
            text: "A bottle that tracks hydration.".to_string(),
        },
    ]
}

#[tokio::test]
async fn transcript_level_comes_from_assignment() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let key = enrolled(&store).await;
    let engine = AssignmentEngine::new(Arc::clone(&store));
    let resolved = engine.get_or_create(key).await.unwrap().assignment;

    for (task, slot) in (2..=4).zip(resolved.record.slots()) {
        let forged = Level::ALL
            .into_iter()
            .find(|level| *level != slot.level)
            .unwrap();
        let saved = append_transcript(
            store.as_ref(),
            TranscriptDraft {
                participant_key: key,
                task,
                round: Some(1),
                entries: entries(),
                requested_level: Some(forged),
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.level, Some(slot.level));
        assert_eq!(saved.round, Some(1));
    }

    let stored = store.transcripts_for(key).await.unwrap();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn baseline_transcript_has_no_level_or_round() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let key = enrolled(&store).await;

    let saved = append_transcript(
        store.as_ref(),
        TranscriptDraft {
            participant_key: key,
            task: 1,
            round: Some(2),
            entries: entries(),
            requested_level: Some(Level::High),
        },
    )
    .await
    .unwrap();
    assert_eq!(saved.level, None);
    assert_eq!(saved.round, None);
}

#[tokio::test]
async fn assisted_transcript_requires_round_and_assignment() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let key = enrolled(&store).await;

    let draft = |round| TranscriptDraft {
        participant_key: key,
        task: 3,
        round,
        entries: entries(),
        requested_level: None,
    };

    let err = append_transcript(store.as_ref(), draft(None)).await.unwrap_err();
    assert!(matches!(err, StudyError::Validation { .. }));

    let err = append_transcript(store.as_ref(), draft(Some(1))).await.unwrap_err();
    assert!(matches!(err, StudyError::NotFound { .. }));

    let err = append_transcript(
        store.as_ref(),
        TranscriptDraft {
            task: 0,
            ..draft(Some(1))
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StudyError::InvalidTask { task: 0 }));
    assert_eq!(store.transcript_count().await, 0);
}

#[tokio::test]
async fn stored_assignment_is_unchanged_by_later_pool_edits() {
    let store = Arc::new(MemoryStore::with_items(pool_3_2_2()));
    let key = enrolled(&store).await;
    let engine = AssignmentEngine::new(Arc::clone(&store));
    let before = engine.get_or_create(key).await.unwrap().assignment;

    let mut grown = store.list_all_items().await.unwrap();
    grown.push(item(Category::Automation, 2, "C3"));
    store.replace_all_items(grown).await.unwrap();

    let after = engine.get_or_create(key).await.unwrap().assignment;
    assert_eq!(after.record, before.record);
    assert!(after.record.created_at() <= Utc::now());
}
