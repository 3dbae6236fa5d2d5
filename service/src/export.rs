//! Consolidated CSV export: one row per participant.
//!
//! Columns follow the analysis sheet: intake answers, the task 1 item and
//! its first three baseline ideas, then for tasks 2–4 the item, level, chat
//! split into participant and assistant messages and up to three ideas per
//! round, and finally the post-survey answers.

use std::collections::HashMap;
use std::io::Write;

use chrono::NaiveDate;
use study_core::AssignmentRecord;
use study_core::ChatTranscriptRecord;
use study_core::IntakeRecord;
use study_core::Item;
use study_core::ItemId;
use study_core::StoreError;
use study_core::StudyStore;
use study_core::TaskNumber;
use study_core::survey::BrainstormKind;
use study_core::survey::BrainstormResponse;
use study_core::survey::PostSurvey;
use study_core::survey::UseCase;
use thiserror::Error;

/// Ideas exported per round
const IDEAS_PER_ROUND: usize = 3;

/// Rounds exported for each assisted task
const ASSISTED_ROUNDS: [u32; 2] = [1, 2];

const MESSAGE_SEPARATOR: &str = " | ";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Column names in output order.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = [
        "preSurveyId",
        "presurveyDate",
        "age",
        "gender",
        "race",
        "experience",
        "designExperience",
        "healthcareFamiliarity",
        "automationFamiliarity",
        "smartDevicesFamiliarity",
        "task1PatentCategory",
        "task1PatentName",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    columns.extend(idea_columns(1, 1));

    for task in 2..=4 {
        for suffix in [
            "PatentCategory",
            "PatentName",
            "Level",
            "UserChatCount",
            "UserChatMessages",
            "GPTChatCount",
            "GPTChatMessages",
        ] {
            columns.push(format!("task{task}{suffix}"));
        }
        for round in ASSISTED_ROUNDS {
            columns.extend(idea_columns(task, round));
        }
    }

    columns.extend(
        [
            "accuracy",
            "helpfulness",
            "inspiration",
            "expansion",
            "recombination",
            "problems",
            "improvements",
        ]
        .into_iter()
        .map(str::to_string),
    );
    columns
}

fn idea_columns(task: u8, round: u32) -> Vec<String> {
    (1..=IDEAS_PER_ROUND)
        .flat_map(|j| {
            [
                format!("task{task}IdeasRound{round}.use{j}"),
                format!("task{task}IdeasRound{round}.explanation{j}"),
            ]
        })
        .collect()
}

/// `use`/`explanation` pairs for the first three ideas, blank-padded.
fn idea_cells(use_cases: Option<&[UseCase]>) -> Vec<String> {
    let use_cases = use_cases.unwrap_or_default();
    (0..IDEAS_PER_ROUND)
        .flat_map(|j| match use_cases.get(j) {
            Some(case) => [case.idea.clone(), case.explanation.clone()],
            None => [String::new(), String::new()],
        })
        .collect()
}

/// Everything stored for one participant.
struct ParticipantData {
    intake: IntakeRecord,
    assignment: Option<AssignmentRecord>,
    transcripts: Vec<ChatTranscriptRecord>,
    brainstorms: Vec<BrainstormResponse>,
    post_survey: Option<PostSurvey>,
}

fn row(data: &ParticipantData, items: &HashMap<ItemId, Item>) -> Vec<String> {
    let answers = &data.intake.answers;
    let text = |value: &serde_json::Value| value.as_str().unwrap_or_default().to_string();
    let enum_text = |value: serde_json::Result<serde_json::Value>| {
        value.map(|v| text(&v)).unwrap_or_default()
    };

    let mut cells = vec![
        data.intake.id.to_string(),
        data.intake.created_at.to_rfc3339(),
        answers.age.clone(),
        enum_text(serde_json::to_value(answers.gender)),
        answers.race.clone(),
        enum_text(serde_json::to_value(answers.experience)),
        enum_text(serde_json::to_value(answers.design_experience)),
        answers.healthcare_familiarity.value().to_string(),
        answers.automation_familiarity.value().to_string(),
        answers.smart_devices_familiarity.value().to_string(),
    ];

    let item_for = |task: TaskNumber| {
        data.assignment
            .as_ref()
            .and_then(|record| items.get(&record.item_for(task)))
    };
    let item_cells = |task: TaskNumber| match item_for(task) {
        Some(item) => [item.category.label().to_string(), item.name.clone()],
        None => [String::new(), String::new()],
    };

    cells.extend(item_cells(TaskNumber::BASELINE));
    let baseline = data
        .brainstorms
        .iter()
        .find(|b| b.kind == BrainstormKind::Baseline)
        .map(|b| b.use_cases.as_slice());
    cells.extend(idea_cells(baseline));

    for task in TaskNumber::ASSISTED {
        cells.extend(item_cells(task));
        cells.push(
            data.assignment
                .as_ref()
                .and_then(|record| record.level_for(task))
                .map(|level| level.as_str().to_string())
                .unwrap_or_default(),
        );

        let (user, assistant): (Vec<&str>, Vec<&str>) = data
            .transcripts
            .iter()
            .filter(|t| t.task == task)
            .flat_map(|t| t.entries.iter())
            .fold((Vec::new(), Vec::new()), |(mut user, mut assistant), entry| {
                if entry.is_from_participant() {
                    user.push(entry.text.as_str());
                } else {
                    assistant.push(entry.text.as_str());
                }
                (user, assistant)
            });
        cells.push(user.len().to_string());
        cells.push(user.join(MESSAGE_SEPARATOR));
        cells.push(assistant.len().to_string());
        cells.push(assistant.join(MESSAGE_SEPARATOR));

        for round in ASSISTED_ROUNDS {
            let ideas = data
                .brainstorms
                .iter()
                .find(|b| {
                    b.kind == BrainstormKind::Assisted
                        && b.task == Some(task)
                        && b.round == Some(round)
                })
                .map(|b| b.use_cases.as_slice());
            cells.extend(idea_cells(ideas));
        }
    }

    match &data.post_survey {
        Some(post) => cells.extend([
            post.accuracy.clone(),
            post.helpfulness.clone(),
            post.inspiration.clone(),
            post.expansion.clone(),
            post.recombination.clone(),
            post.problems.clone().unwrap_or_default(),
            post.improvements.clone().unwrap_or_default(),
        ]),
        None => cells.extend(std::iter::repeat_n(String::new(), 7)),
    }
    cells
}

/// Write the consolidated sheet to `writer`. `since` keeps participants
/// whose intake was recorded on or after that UTC date. Returns the number
/// of participant rows written.
pub async fn export_csv<S, W>(
    store: &S,
    since: Option<NaiveDate>,
    writer: W,
) -> Result<usize, ExportError>
where
    S: StudyStore + ?Sized,
    W: Write,
{
    let items: HashMap<ItemId, Item> = store
        .list_all_items()
        .await?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();
    let mut assignments: HashMap<_, _> = store
        .list_assignments()
        .await?
        .into_iter()
        .map(|record| (record.participant_key(), record))
        .collect();

    let mut participants = Vec::new();
    for intake in store.list_intakes().await? {
        if since.is_some_and(|date| intake.created_at.date_naive() < date) {
            continue;
        }
        let key = intake.id;
        participants.push(ParticipantData {
            assignment: assignments.remove(&key),
            transcripts: store.transcripts_for(key).await?,
            brainstorms: store.brainstorms_for(key).await?,
            post_survey: store.post_survey_for(key).await?,
            intake,
        });
    }

    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header())?;
    for data in &participants {
        wtr.write_record(row(data, &items))?;
    }
    wtr.flush()?;

    tracing::info!(
        rows = participants.len(),
        since = ?since,
        "consolidated export written"
    );
    Ok(participants.len())
}
