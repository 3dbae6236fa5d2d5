//! Patent assignment engine.
//!
//! Each participant gets one item for the baseline task drawn from the whole
//! pool, then one item per category for tasks 2–4 (never the baseline item),
//! with the categories and the severity levels each randomly permuted over
//! the three assisted slots. The draw is persisted once per participant;
//! every later call returns the stored record.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::errors::{PoolShortfall, Result, StudyError};
use crate::item::{Category, Item, ItemId, Level};
use crate::participant::ParticipantKey;
use crate::store::{AssignmentStore, IntakeStore, ItemStore};
use crate::task::TaskNumber;

/// Smallest pool that can fill all four tasks.
pub const MIN_POOL_SIZE: usize = 4;

/// One assisted-task slot (task 2, 3 or 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSlot {
    pub item: ItemId,
    pub category: Category,
    pub level: Level,
}

/// An unpersisted sample from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentDraw {
    pub task1_item: ItemId,
    pub slots: [TaskSlot; 3],
}

// ─────────────────────────────────────────────────────────────────────────────
// Stored record
// ─────────────────────────────────────────────────────────────────────────────

/// The persisted assignment for one participant.
///
/// Construction validates the permutation and distinctness invariants, so a
/// value of this type always describes a legal assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "AssignmentRow", try_from = "AssignmentRow")]
pub struct AssignmentRecord {
    participant_key: ParticipantKey,
    task1_item: ItemId,
    slots: [TaskSlot; 3],
    created_at: DateTime<Utc>,
}

impl AssignmentRecord {
    pub fn new(
        participant_key: ParticipantKey,
        draw: AssignmentDraw,
        created_at: DateTime<Utc>,
    ) -> std::result::Result<Self, String> {
        check_invariants(&draw)?;
        Ok(Self {
            participant_key,
            task1_item: draw.task1_item,
            slots: draw.slots,
            created_at,
        })
    }

    pub fn participant_key(&self) -> ParticipantKey {
        self.participant_key
    }

    pub fn task1_item(&self) -> ItemId {
        self.task1_item
    }

    pub fn slots(&self) -> &[TaskSlot; 3] {
        &self.slots
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Slot for an assisted task; `None` for the baseline.
    pub fn slot(&self, task: TaskNumber) -> Option<&TaskSlot> {
        task.slot_index().map(|i| &self.slots[i])
    }

    pub fn item_for(&self, task: TaskNumber) -> ItemId {
        self.slot(task).map_or(self.task1_item, |slot| slot.item)
    }

    pub fn level_for(&self, task: TaskNumber) -> Option<Level> {
        self.slot(task).map(|slot| slot.level)
    }

    /// All four item ids in task order.
    pub fn item_ids(&self) -> [ItemId; 4] {
        [
            self.task1_item,
            self.slots[0].item,
            self.slots[1].item,
            self.slots[2].item,
        ]
    }
}

fn check_invariants(draw: &AssignmentDraw) -> std::result::Result<(), String> {
    let mut categories = draw.slots.map(|slot| slot.category);
    categories.sort();
    if categories != Category::ALL {
        return Err(format!(
            "task categories {categories:?} are not a permutation of all categories"
        ));
    }

    let mut levels = draw.slots.map(|slot| slot.level);
    levels.sort();
    if levels != Level::ALL {
        return Err(format!("task levels {levels:?} are not a permutation of low/medium/high"));
    }

    let [a, b, c] = draw.slots.map(|slot| slot.item);
    if a == b || b == c || a == c {
        return Err("assisted tasks share an item".to_string());
    }
    if draw.slots.iter().any(|slot| slot.item == draw.task1_item) {
        return Err(format!(
            "baseline item {} reused in an assisted task",
            draw.task1_item
        ));
    }
    Ok(())
}

/// Flat wire and storage layout of an assignment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub participant_key: ParticipantKey,
    pub task1_item: ItemId,
    pub task2_item: ItemId,
    pub task3_item: ItemId,
    pub task4_item: ItemId,
    pub task2_category: Category,
    pub task3_category: Category,
    pub task4_category: Category,
    pub task2_level: Level,
    pub task3_level: Level,
    pub task4_level: Level,
    pub created_at: DateTime<Utc>,
}

impl From<AssignmentRecord> for AssignmentRow {
    fn from(record: AssignmentRecord) -> Self {
        let [s2, s3, s4] = record.slots;
        Self {
            participant_key: record.participant_key,
            task1_item: record.task1_item,
            task2_item: s2.item,
            task3_item: s3.item,
            task4_item: s4.item,
            task2_category: s2.category,
            task3_category: s3.category,
            task4_category: s4.category,
            task2_level: s2.level,
            task3_level: s3.level,
            task4_level: s4.level,
            created_at: record.created_at,
        }
    }
}

impl TryFrom<AssignmentRow> for AssignmentRecord {
    type Error = String;

    fn try_from(row: AssignmentRow) -> std::result::Result<Self, Self::Error> {
        let draw = AssignmentDraw {
            task1_item: row.task1_item,
            slots: [
                TaskSlot {
                    item: row.task2_item,
                    category: row.task2_category,
                    level: row.task2_level,
                },
                TaskSlot {
                    item: row.task3_item,
                    category: row.task3_category,
                    level: row.task3_level,
                },
                TaskSlot {
                    item: row.task4_item,
                    category: row.task4_category,
                    level: row.task4_level,
                },
            ],
        };
        Self::new(row.participant_key, draw, row.created_at)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sampling
// ─────────────────────────────────────────────────────────────────────────────

/// Draw an assignment from `pool`.
///
/// The baseline item is uniform over the whole pool. Categories and levels are
/// Fisher–Yates shuffled onto slots 2–4, and each slot draws uniformly from
/// its category with the baseline item excluded.
pub fn draw_assignment<R: Rng + ?Sized>(pool: &[Item], rng: &mut R) -> Result<AssignmentDraw> {
    if pool.len() < MIN_POOL_SIZE {
        return Err(StudyError::InsufficientPool(PoolShortfall::TooFewItems {
            available: pool.len(),
        }));
    }
    let task1 = pool
        .choose(rng)
        .ok_or(StudyError::InsufficientPool(PoolShortfall::TooFewItems { available: 0 }))?;

    let mut categories = Category::ALL;
    categories.shuffle(rng);

    let mut picks = [task1.id; 3];
    for (pick, category) in picks.iter_mut().zip(categories) {
        let candidates: Vec<&Item> = pool
            .iter()
            .filter(|item| item.category == category && item.id != task1.id)
            .collect();
        let chosen = candidates
            .choose(rng)
            .ok_or(StudyError::InsufficientPool(PoolShortfall::EmptyCategory { category }))?;
        *pick = chosen.id;
    }

    let mut levels = Level::ALL;
    levels.shuffle(rng);

    Ok(AssignmentDraw {
        task1_item: task1.id,
        slots: std::array::from_fn(|i| TaskSlot {
            item: picks[i],
            category: categories[i],
            level: levels[i],
        }),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved views
// ─────────────────────────────────────────────────────────────────────────────

/// An assignment with all four items loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssignment {
    pub record: AssignmentRecord,
    pub task1_item: Item,
    pub slot_items: [Item; 3],
}

impl ResolvedAssignment {
    pub fn item_for(&self, task: TaskNumber) -> &Item {
        task.slot_index()
            .map_or(&self.task1_item, |i| &self.slot_items[i])
    }
}

impl Serialize for ResolvedAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let slots = self.record.slots();
        let mut state = serializer.serialize_struct("ResolvedAssignment", 12)?;
        state.serialize_field("participantKey", &self.record.participant_key())?;
        state.serialize_field("task1Item", &self.task1_item)?;
        state.serialize_field("task2Item", &self.slot_items[0])?;
        state.serialize_field("task3Item", &self.slot_items[1])?;
        state.serialize_field("task4Item", &self.slot_items[2])?;
        state.serialize_field("task2Category", &slots[0].category)?;
        state.serialize_field("task3Category", &slots[1].category)?;
        state.serialize_field("task4Category", &slots[2].category)?;
        state.serialize_field("task2Level", &slots[0].level)?;
        state.serialize_field("task3Level", &slots[1].level)?;
        state.serialize_field("task4Level", &slots[2].level)?;
        state.serialize_field("createdAt", &self.record.created_at())?;
        state.end()
    }
}

/// The item (and level, for tasks 2–4) a participant works on in one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskAssignment {
    pub task: TaskNumber,
    pub item: Item,
    pub level: Option<Level>,
}

/// Result of `get_or_create`, telling the caller whether this call stored it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentOutcome {
    pub assignment: ResolvedAssignment,
    pub created: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

pub struct AssignmentEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for AssignmentEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> AssignmentEngine<S>
where
    S: ItemStore + AssignmentStore + IntakeStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Return the participant's assignment, drawing and storing one first if
    /// none exists. Idempotent per participant.
    pub async fn get_or_create(&self, key: ParticipantKey) -> Result<AssignmentOutcome> {
        self.get_or_create_with(key, |pool| {
            let mut rng = rand::rng();
            draw_assignment(pool, &mut rng)
        })
        .await
    }

    /// Same as [`Self::get_or_create`] with a deterministic random source.
    pub async fn get_or_create_seeded(
        &self,
        key: ParticipantKey,
        seed: u64,
    ) -> Result<AssignmentOutcome> {
        self.get_or_create_with(key, |pool| {
            let mut rng = StdRng::seed_from_u64(seed);
            draw_assignment(pool, &mut rng)
        })
        .await
    }

    async fn get_or_create_with<F>(&self, key: ParticipantKey, draw: F) -> Result<AssignmentOutcome>
    where
        F: FnOnce(&[Item]) -> Result<AssignmentDraw> + Send,
    {
        if !self.store.intake_exists(key).await? {
            return Err(StudyError::not_found(format!("participant {key}")));
        }

        if let Some(existing) = self.store.find_by_participant_key(key).await? {
            debug!(participant = %key, "assignment already exists");
            let assignment = self.resolve(existing).await?;
            return Ok(AssignmentOutcome {
                assignment,
                created: false,
            });
        }

        let pool = self.store.list_all_items().await?;
        let sample = match draw(&pool) {
            Ok(sample) => sample,
            Err(err) => {
                warn!(
                    participant = %key,
                    pool_size = pool.len(),
                    code = err.category().as_str(),
                    "assignment draw failed: {err}"
                );
                return Err(err);
            }
        };
        let record =
            AssignmentRecord::new(key, sample, Utc::now()).map_err(StudyError::invalid_state)?;

        let outcome = self.store.create_if_absent(record).await?;
        if outcome.was_new {
            info!(participant = %key, pool_size = pool.len(), "assigned patents");
        } else {
            info!(participant = %key, "concurrent assignment won; returning stored record");
        }

        let assignment = resolve_from_pool(outcome.record, &pool)?;
        Ok(AssignmentOutcome {
            assignment,
            created: outcome.was_new,
        })
    }

    /// The stored assignment, resolved. `NotFound` when none exists.
    pub async fn get_assignment(&self, key: ParticipantKey) -> Result<ResolvedAssignment> {
        let record = self.find_record(key).await?;
        self.resolve(record).await
    }

    /// The item and level for one task. The task number is checked before
    /// the store is consulted.
    pub async fn get_assignment_for_task(
        &self,
        key: ParticipantKey,
        task: i64,
    ) -> Result<TaskAssignment> {
        let task = TaskNumber::new(task)?;
        let record = self.find_record(key).await?;
        let item_id = record.item_for(task);
        let item = self
            .store
            .get_items(&[item_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StudyError::invalid_state(format!("assigned item {item_id} missing")))?;
        Ok(TaskAssignment {
            task,
            item,
            level: record.level_for(task),
        })
    }

    async fn find_record(&self, key: ParticipantKey) -> Result<AssignmentRecord> {
        self.store
            .find_by_participant_key(key)
            .await?
            .ok_or_else(|| StudyError::not_found(format!("assignment for participant {key}")))
    }

    async fn resolve(&self, record: AssignmentRecord) -> Result<ResolvedAssignment> {
        let items = self.store.get_items(&record.item_ids()).await?;
        resolve_from_pool(record, &items)
    }
}

fn resolve_from_pool(record: AssignmentRecord, items: &[Item]) -> Result<ResolvedAssignment> {
    let by_id: HashMap<ItemId, &Item> = items.iter().map(|item| (item.id, item)).collect();
    let lookup = |id: ItemId| -> Result<Item> {
        by_id
            .get(&id)
            .map(|item| (*item).clone())
            .ok_or_else(|| StudyError::invalid_state(format!("assigned item {id} missing")))
    };
    let [t1, t2, t3, t4] = record.item_ids();
    let task1_item = lookup(t1)?;
    let slot_items = [lookup(t2)?, lookup(t3)?, lookup(t4)?];
    Ok(ResolvedAssignment {
        record,
        task1_item,
        slot_items,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::item::{PatentStatus, SeverityVariants};
    use pretty_assertions::assert_eq;

    fn item(category: Category, name: &str) -> Item {
        Item {
            id: ItemId::new(),
            category,
            category_order: 0,
            classifications: String::new(),
            name: name.to_string(),
            link: String::new(),
            description: String::new(),
            status: PatentStatus::Active,
            year: None,
            severity_variants: SeverityVariants::default(),
        }
    }

    fn pool_3_2_2() -> Vec<Item> {
        vec![
            item(Category::SmartContainers, "A1"),
            item(Category::SmartContainers, "A2"),
            item(Category::SmartContainers, "A3"),
            item(Category::Healthcare, "B1"),
            item(Category::Healthcare, "B2"),
            item(Category::Automation, "C1"),
            item(Category::Automation, "C2"),
        ]
    }

    #[test]
    fn draws_satisfy_invariants_over_many_seeds() {
        let pool = pool_3_2_2();
        for seed in 0..500 {
            let mut rng = StdRng::seed_from_u64(seed);
            let draw = draw_assignment(&pool, &mut rng).expect("pool is sufficient");
            check_invariants(&draw).expect("invariants hold");

            for slot in draw.slots {
                let stored = pool.iter().find(|i| i.id == slot.item).expect("from pool");
                assert_eq!(stored.category, slot.category, "seed {seed}");
            }
        }
    }

    #[test]
    fn every_category_and_level_order_is_reachable() {
        let pool = pool_3_2_2();
        let mut category_orders = std::collections::HashSet::new();
        let mut level_orders = std::collections::HashSet::new();
        for seed in 0..500 {
            let mut rng = StdRng::seed_from_u64(seed);
            let draw = draw_assignment(&pool, &mut rng).expect("draw");
            category_orders.insert(draw.slots.map(|s| s.category));
            level_orders.insert(draw.slots.map(|s| s.level));
        }
        assert_eq!(category_orders.len(), 6);
        assert_eq!(level_orders.len(), 6);
    }

    #[test]
    fn too_small_pool_is_rejected() {
        let pool: Vec<Item> = pool_3_2_2().into_iter().take(3).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let err = draw_assignment(&pool, &mut rng).expect_err("three items");
        assert!(matches!(
            err,
            StudyError::InsufficientPool(PoolShortfall::TooFewItems { available: 3 })
        ));
    }

    #[test]
    fn category_emptied_by_baseline_pick_is_rejected() {
        // Healthcare has a single item; whenever it is the baseline pick the
        // Healthcare slot has nothing left.
        let pool = vec![
            item(Category::SmartContainers, "A1"),
            item(Category::SmartContainers, "A2"),
            item(Category::Healthcare, "B1"),
            item(Category::Automation, "C1"),
            item(Category::Automation, "C2"),
        ];
        let healthcare = pool[2].id;
        let mut saw_failure = false;
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            match draw_assignment(&pool, &mut rng) {
                Ok(draw) => assert_ne!(draw.task1_item, healthcare),
                Err(err) => {
                    assert!(matches!(
                        err,
                        StudyError::InsufficientPool(PoolShortfall::EmptyCategory {
                            category: Category::Healthcare
                        })
                    ));
                    saw_failure = true;
                }
            }
        }
        assert!(saw_failure);
    }

    #[test]
    fn record_rejects_illegal_layouts() {
        let pool = pool_3_2_2();
        let mut rng = StdRng::seed_from_u64(1);
        let draw = draw_assignment(&pool, &mut rng).expect("draw");

        let mut duplicate_level = draw;
        duplicate_level.slots[1].level = duplicate_level.slots[0].level;
        assert!(AssignmentRecord::new(ParticipantKey::new(), duplicate_level, Utc::now()).is_err());

        let mut reused_baseline = draw;
        reused_baseline.slots[2].item = draw.task1_item;
        assert!(AssignmentRecord::new(ParticipantKey::new(), reused_baseline, Utc::now()).is_err());

        assert!(AssignmentRecord::new(ParticipantKey::new(), draw, Utc::now()).is_ok());
    }

    #[test]
    fn record_serializes_flat() {
        let pool = pool_3_2_2();
        let mut rng = StdRng::seed_from_u64(3);
        let draw = draw_assignment(&pool, &mut rng).expect("draw");
        let record = AssignmentRecord::new(ParticipantKey::new(), draw, Utc::now()).expect("legal");

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["task2Level"], draw.slots[0].level.as_str());
        assert_eq!(json["task4Category"], draw.slots[2].category.label());

        let back: AssignmentRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn tampered_row_fails_to_deserialize() {
        let pool = pool_3_2_2();
        let mut rng = StdRng::seed_from_u64(4);
        let draw = draw_assignment(&pool, &mut rng).expect("draw");
        let record = AssignmentRecord::new(ParticipantKey::new(), draw, Utc::now()).expect("legal");

        let mut json = serde_json::to_value(&record).expect("serialize");
        json["task3Level"] = json["task2Level"].clone();
        assert!(serde_json::from_value::<AssignmentRecord>(json).is_err());
    }
}
