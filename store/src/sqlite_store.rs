//! SQLite implementation of the study store traits.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use study_core::item::{Category, Item, ItemId};
use study_core::participant::{IntakeRecord, ParticipantKey};
use study_core::store::{
    AssignmentStore, CreateOutcome, IntakeStore, ItemStore, StoreError, StoreResult, StudyStore,
    SurveyStore, TranscriptStore,
};
use study_core::survey::{AiAnswersUpdate, BrainstormResponse, PostSurvey, TaskPostSurvey};
use study_core::{AssignmentRecord, ChatTranscriptRecord, RecordId};

use super::async_wrapper::with_connection;
use super::connection::{DbPool, initialize_memory_pool, initialize_pool};
use super::migrations::migrate_to_latest;
use super::rows::{
    ASSIGNMENT_COLUMNS, BRAINSTORM_COLUMNS, ITEM_COLUMNS, POST_SURVEY_COLUMNS, RawAssignment,
    RawBrainstorm, RawIntake, RawItem, RawPostSurvey, RawTaskSurvey, RawTranscript,
    TASK_SURVEY_COLUMNS, TRANSCRIPT_COLUMNS,
};
use super::transactions::execute_in_transaction;
use super::{DbError, Result};

/// Store handle over an r2d2 pool. Cloning shares the pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path, pool_size: u32) -> Result<Self> {
        let pool = initialize_pool(path, pool_size)?;
        migrate_to_latest(&mut *pool.get()?)?;
        tracing::info!(path = %path.display(), pool_size, "study database ready");
        Ok(Self { pool })
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let pool = initialize_memory_pool()?;
        migrate_to_latest(&mut *pool.get()?)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn run<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        with_connection(&self.pool, f).await.map_err(StoreError::from)
    }
}

fn collect_rows<R, T, P, F, D>(
    conn: &Connection,
    sql: &str,
    params: P,
    from_row: F,
    decode: D,
) -> Result<Vec<T>>
where
    P: rusqlite::Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<R>,
    D: FnMut(R) -> Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params, from_row)?
        .collect::<rusqlite::Result<Vec<R>>>()?;
    raw.into_iter().map(decode).collect()
}

fn to_json<T: serde::Serialize + ?Sized>(what: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DbError::Corrupt(format!("encode {what}: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// items
// ─────────────────────────────────────────────────────────────────────────────

fn insert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO items ({ITEM_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            item.id.to_string(),
            item.category.label(),
            item.category_order,
            item.classifications,
            item.name,
            item.link,
            item.description,
            item.status.as_str(),
            item.year,
            item.severity_variants.low,
            item.severity_variants.medium,
            item.severity_variants.high,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn list_all_items(&self) -> StoreResult<Vec<Item>> {
        self.run(|conn| {
            collect_rows(
                conn,
                &format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY category_order, name"),
                [],
                RawItem::from_row,
                RawItem::decode,
            )
        })
        .await
    }

    async fn get_items(&self, ids: &[ItemId]) -> StoreResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        self.run(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            collect_rows(
                conn,
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id IN ({placeholders})"),
                rusqlite::params_from_iter(ids.iter()),
                RawItem::from_row,
                RawItem::decode,
            )
        })
        .await
    }

    async fn items_by_category(&self, category: Category) -> StoreResult<Vec<Item>> {
        self.run(move |conn| {
            collect_rows(
                conn,
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE category = ?1
                     ORDER BY category_order, name"
                ),
                [category.label()],
                RawItem::from_row,
                RawItem::decode,
            )
        })
        .await
    }

    async fn replace_all_items(&self, items: Vec<Item>) -> StoreResult<usize> {
        self.run(move |conn| {
            execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
                let removed = tx.execute("DELETE FROM items", [])?;
                for item in &items {
                    insert_item(tx, item)?;
                }
                tracing::info!(removed, inserted = items.len(), "replaced item catalogue");
                Ok(items.len())
            })
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// intakes
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl IntakeStore for SqliteStore {
    async fn intake_exists(&self, key: ParticipantKey) -> StoreResult<bool> {
        self.run(move |conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM intakes WHERE id = ?1)",
                [key.to_string()],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn insert_intake(&self, record: &IntakeRecord) -> StoreResult<()> {
        let id = record.id.to_string();
        let created_at = record.created_at.to_rfc3339();
        let answers = to_json("intake answers", &record.answers).map_err(StoreError::from)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO intakes (id, answers_json, created_at) VALUES (?1, ?2, ?3)",
                params![id, answers, created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_intake(&self, key: ParticipantKey) -> StoreResult<Option<IntakeRecord>> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, answers_json, created_at FROM intakes WHERE id = ?1",
                [key.to_string()],
                RawIntake::from_row,
            )
            .optional()?
            .map(RawIntake::decode)
            .transpose()
        })
        .await
    }

    async fn list_intakes(&self) -> StoreResult<Vec<IntakeRecord>> {
        self.run(|conn| {
            collect_rows(
                conn,
                "SELECT id, answers_json, created_at FROM intakes ORDER BY created_at, rowid",
                [],
                RawIntake::from_row,
                RawIntake::decode,
            )
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// assignments
// ─────────────────────────────────────────────────────────────────────────────

fn find_assignment(conn: &Connection, key: &str) -> Result<Option<AssignmentRecord>> {
    conn.query_row(
        &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE participant_key = ?1"),
        [key],
        RawAssignment::from_row,
    )
    .optional()?
    .map(RawAssignment::decode)
    .transpose()
}

#[async_trait]
impl AssignmentStore for SqliteStore {
    async fn find_by_participant_key(
        &self,
        key: ParticipantKey,
    ) -> StoreResult<Option<AssignmentRecord>> {
        self.run(move |conn| find_assignment(conn, &key.to_string()))
            .await
    }

    async fn create_if_absent(&self, record: AssignmentRecord) -> StoreResult<CreateOutcome> {
        self.run(move |conn| {
            let key = record.participant_key().to_string();
            let [s2, s3, s4] = *record.slots();
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO assignments ({ASSIGNMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                     ON CONFLICT(participant_key) DO NOTHING"
                ),
                params![
                    key,
                    record.task1_item().to_string(),
                    s2.item.to_string(),
                    s3.item.to_string(),
                    s4.item.to_string(),
                    s2.category.label(),
                    s3.category.label(),
                    s4.category.label(),
                    s2.level.as_str(),
                    s3.level.as_str(),
                    s4.level.as_str(),
                    record.created_at().to_rfc3339(),
                ],
            )?;

            // Re-read so a lost race returns the row that won.
            let stored = find_assignment(conn, &key)?.ok_or_else(|| {
                DbError::Corrupt(format!("assignment for {key} missing after insert"))
            })?;
            Ok(CreateOutcome {
                record: stored,
                was_new: inserted == 1,
            })
        })
        .await
    }

    async fn list_assignments(&self) -> StoreResult<Vec<AssignmentRecord>> {
        self.run(|conn| {
            collect_rows(
                conn,
                &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments ORDER BY created_at"),
                [],
                RawAssignment::from_row,
                RawAssignment::decode,
            )
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// transcripts
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TranscriptStore for SqliteStore {
    async fn insert_transcript(&self, record: &ChatTranscriptRecord) -> StoreResult<()> {
        let entries = to_json("chat entries", &record.entries).map_err(StoreError::from)?;
        let id = record.id.to_string();
        let key = record.participant_key.to_string();
        let task = i64::from(record.task);
        let round = record.round;
        let level = record.level.map(|level| level.as_str());
        let created_at = record.created_at.to_rfc3339();
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO transcripts ({TRANSCRIPT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![id, key, task, round, level, entries, created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn transcripts_for(
        &self,
        key: ParticipantKey,
    ) -> StoreResult<Vec<ChatTranscriptRecord>> {
        self.run(move |conn| {
            collect_rows(
                conn,
                &format!(
                    "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts
                     WHERE participant_key = ?1 ORDER BY seq"
                ),
                [key.to_string()],
                RawTranscript::from_row,
                RawTranscript::decode,
            )
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// surveys and brainstorms
// ─────────────────────────────────────────────────────────────────────────────

fn find_task_survey(conn: &Connection, id: &str) -> Result<Option<TaskPostSurvey>> {
    conn.query_row(
        &format!("SELECT {TASK_SURVEY_COLUMNS} FROM task_surveys WHERE id = ?1"),
        [id],
        RawTaskSurvey::from_row,
    )
    .optional()?
    .map(RawTaskSurvey::decode)
    .transpose()
}

fn answer_text<T: Copy + Into<String>>(value: Option<T>) -> Option<String> {
    value.map(Into::into)
}

#[async_trait]
impl SurveyStore for SqliteStore {
    async fn insert_brainstorm(&self, response: &BrainstormResponse) -> StoreResult<()> {
        let use_cases = to_json("use cases", &response.use_cases).map_err(StoreError::from)?;
        let response = response.clone();
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO brainstorms ({BRAINSTORM_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    response.id.to_string(),
                    response.participant_key.to_string(),
                    response.kind.as_str(),
                    use_cases,
                    response.round,
                    response.object,
                    response.task.map(i64::from),
                    response.temperature,
                    response.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn brainstorms_for(&self, key: ParticipantKey) -> StoreResult<Vec<BrainstormResponse>> {
        self.run(move |conn| {
            collect_rows(
                conn,
                &format!(
                    "SELECT {BRAINSTORM_COLUMNS} FROM brainstorms
                     WHERE participant_key = ?1 ORDER BY seq"
                ),
                [key.to_string()],
                RawBrainstorm::from_row,
                RawBrainstorm::decode,
            )
        })
        .await
    }

    async fn insert_task_survey(&self, survey: &TaskPostSurvey) -> StoreResult<()> {
        let survey = survey.clone();
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO task_surveys ({TASK_SURVEY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    survey.id.to_string(),
                    survey.participant_key.to_string(),
                    i64::from(survey.task_number),
                    answer_text(survey.ai_accuracy),
                    answer_text(survey.ai_helpfulness),
                    answer_text(survey.confidence),
                    answer_text(survey.difficulty),
                    survey.created_at.to_rfc3339(),
                    survey.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_task_surveys(&self) -> StoreResult<Vec<TaskPostSurvey>> {
        self.run(|conn| {
            collect_rows(
                conn,
                &format!("SELECT {TASK_SURVEY_COLUMNS} FROM task_surveys ORDER BY seq DESC"),
                [],
                RawTaskSurvey::from_row,
                RawTaskSurvey::decode,
            )
        })
        .await
    }

    async fn get_task_survey(&self, id: RecordId) -> StoreResult<Option<TaskPostSurvey>> {
        self.run(move |conn| find_task_survey(conn, &id.to_string()))
            .await
    }

    async fn task_surveys_for(&self, key: ParticipantKey) -> StoreResult<Vec<TaskPostSurvey>> {
        self.run(move |conn| {
            collect_rows(
                conn,
                &format!(
                    "SELECT {TASK_SURVEY_COLUMNS} FROM task_surveys
                     WHERE participant_key = ?1 ORDER BY seq"
                ),
                [key.to_string()],
                RawTaskSurvey::from_row,
                RawTaskSurvey::decode,
            )
        })
        .await
    }

    async fn update_task_survey(
        &self,
        id: RecordId,
        update: &AiAnswersUpdate,
    ) -> StoreResult<Option<TaskPostSurvey>> {
        let update = *update;
        self.run(move |conn| {
            execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
                let id = id.to_string();
                let Some(mut survey) = find_task_survey(tx, &id)? else {
                    return Ok(None);
                };
                survey.apply(&update);
                tx.execute(
                    "UPDATE task_surveys
                     SET ai_accuracy = ?2, ai_helpfulness = ?3, updated_at = ?4
                     WHERE id = ?1",
                    params![
                        id,
                        answer_text(survey.ai_accuracy),
                        answer_text(survey.ai_helpfulness),
                        survey.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(Some(survey))
            })
        })
        .await
    }

    async fn delete_task_survey(&self, id: RecordId) -> StoreResult<Option<TaskPostSurvey>> {
        self.run(move |conn| {
            execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
                let id = id.to_string();
                let existing = find_task_survey(tx, &id)?;
                if existing.is_some() {
                    tx.execute("DELETE FROM task_surveys WHERE id = ?1", [&id])?;
                }
                Ok(existing)
            })
        })
        .await
    }

    async fn insert_post_survey(&self, survey: &PostSurvey) -> StoreResult<()> {
        let survey = survey.clone();
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO post_surveys ({POST_SURVEY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    survey.id.to_string(),
                    survey.participant_key.to_string(),
                    survey.accuracy,
                    survey.helpfulness,
                    survey.inspiration,
                    survey.expansion,
                    survey.recombination,
                    survey.problems,
                    survey.improvements,
                    survey.agree_to_terms,
                    survey.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn post_survey_for(&self, key: ParticipantKey) -> StoreResult<Option<PostSurvey>> {
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {POST_SURVEY_COLUMNS} FROM post_surveys
                     WHERE participant_key = ?1 ORDER BY seq DESC LIMIT 1"
                ),
                [key.to_string()],
                RawPostSurvey::from_row,
            )
            .optional()?
            .map(RawPostSurvey::decode)
            .transpose()
        })
        .await
    }
}

#[async_trait]
impl StudyStore for SqliteStore {
    async fn ping(&self) -> StoreResult<()> {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::migrations::{SCHEMA_VERSION, schema_version};
    use pretty_assertions::assert_eq;
    use study_core::item::{PatentStatus, SeverityVariants};
    use study_core::participant::{
        AiExperience, DesignExperience, Familiarity, Gender, IntakeAnswers,
    };
    use study_core::survey::{AiAccuracy, AiHelpfulness, TaskSurveyAnswers};
    use study_core::task::TaskNumber;

    fn item(category: Category, name: &str) -> Item {
        Item {
            id: ItemId::new(),
            category,
            category_order: 1,
            classifications: "A47G".to_string(),
            name: name.to_string(),
            link: String::new(),
            description: "desc".to_string(),
            status: PatentStatus::Pending,
            year: Some(2019),
            severity_variants: SeverityVariants {
                low: "low text".to_string(),
                medium: String::new(),
                high: "high text".to_string(),
            },
        }
    }

    fn intake() -> IntakeRecord {
        IntakeRecord::new(IntakeAnswers {
            age: "18-24".to_string(),
            gender: Gender::Female,
            race: "White".to_string(),
            experience: AiExperience::Beginner,
            design_experience: DesignExperience::Extensive,
            healthcare_familiarity: Familiarity::new(1).unwrap(),
            automation_familiarity: Familiarity::new(5).unwrap(),
            smart_devices_familiarity: Familiarity::new(3).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_item_roundtrip_and_replace() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = vec![item(Category::Healthcare, "b"), item(Category::Healthcare, "a")];
        assert_eq!(store.replace_all_items(first.clone()).await.unwrap(), 2);

        let listed = store.list_all_items().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(listed[0], first[1]);

        let replacement = vec![item(Category::Automation, "c")];
        store.replace_all_items(replacement.clone()).await.unwrap();
        assert_eq!(store.list_all_items().await.unwrap(), replacement);
        assert!(
            store
                .items_by_category(Category::Healthcare)
                .await
                .unwrap()
                .is_empty()
        );
        let fetched = store.get_items(&[replacement[0].id]).await.unwrap();
        assert_eq!(fetched, replacement);
    }

    #[tokio::test]
    async fn test_intake_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = intake();
        assert!(!store.intake_exists(record.id).await.unwrap());
        store.insert_intake(&record).await.unwrap();
        assert!(store.intake_exists(record.id).await.unwrap());

        let loaded = store.get_intake(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.answers, record.answers);
        assert_eq!(loaded.created_at.timestamp_micros(), record.created_at.timestamp_micros());
    }

    #[tokio::test]
    async fn test_task_survey_update_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = ParticipantKey::new();
        let survey = TaskPostSurvey::new(
            key,
            TaskNumber::new(3).unwrap(),
            TaskSurveyAnswers::Assisted {
                accuracy: AiAccuracy::SomeMadeSense,
                helpfulness: AiHelpfulness::VeryHelpful,
            },
        )
        .unwrap();
        store.insert_task_survey(&survey).await.unwrap();

        let updated = store
            .update_task_survey(
                survey.id,
                &AiAnswersUpdate {
                    ai_accuracy: Some(AiAccuracy::HighlyLogical),
                    ai_helpfulness: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.ai_accuracy, Some(AiAccuracy::HighlyLogical));
        assert_eq!(updated.ai_helpfulness, Some(AiHelpfulness::VeryHelpful));

        let reloaded = store.get_task_survey(survey.id).await.unwrap().unwrap();
        assert_eq!(reloaded.ai_accuracy, Some(AiAccuracy::HighlyLogical));

        assert!(store.delete_task_survey(survey.id).await.unwrap().is_some());
        assert!(store.delete_task_survey(survey.id).await.unwrap().is_none());
        assert!(
            store
                .update_task_survey(RecordId::new(), &AiAnswersUpdate::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_open_migrates_file_database_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("study.db");

        let store = SqliteStore::open(&path, 2).unwrap();
        let version = schema_version(&store.pool().get().unwrap()).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        store.insert_intake(&intake()).await.unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path, 2).unwrap();
        let version = schema_version(&reopened.pool().get().unwrap()).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert_eq!(reopened.list_intakes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ping() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ping().await.unwrap();
    }
}
