//! HTTP surface of the study service.
//!
//! ```text
//! /api
//! ├── /PreSurvey               - intake form
//! ├── /patents[/category/:c]   - item catalogue
//! ├── /patent-assignment       - create / fetch assignments
//! ├── /patent-for-task         - item and level for one task
//! ├── /chatbotmessages         - chat transcripts
//! ├── /AUT, /AUT_gpt           - brainstorm ideas
//! ├── /task-post-survey        - per-task survey CRUD
//! ├── /PostSurvey              - final survey
//! ├── /openai                  - completion proxy
//! └── /dbcheck                 - store health
//! ```

mod brainstorm;
mod fields;
mod intake;
mod middleware;
mod openai;
mod patents;
mod surveys;
mod transcripts;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use study_core::AssignmentEngine;
use study_core::StudyStore;

use crate::completion::CompletionClient;

/// Shared handler state. The store handle is constructed by the caller and
/// dropped with the last clone of this state.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn StudyStore>,
    engine: AssignmentEngine<dyn StudyStore>,
    completion: CompletionClient,
}

impl AppState {
    pub fn new(store: Arc<dyn StudyStore>, completion: CompletionClient) -> Self {
        let engine = AssignmentEngine::new(Arc::clone(&store));
        Self {
            store,
            engine,
            completion,
        }
    }

    pub fn store(&self) -> &Arc<dyn StudyStore> {
        &self.store
    }
}

/// Build the complete router with request logging and CORS applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/PreSurvey", post(intake::create_intake))
        .route("/api/patents", get(patents::list_patents))
        .route(
            "/api/patents/category/:category",
            get(patents::list_patents_by_category),
        )
        .route("/api/patent-assignment", post(patents::create_assignment))
        .route(
            "/api/patent-assignment/:pre_survey_id",
            get(patents::get_assignment),
        )
        .route(
            "/api/patent-for-task/:pre_survey_id/:task_number",
            get(patents::get_patent_for_task),
        )
        .route("/api/chatbotmessages", post(transcripts::create_transcript))
        .route("/api/AUT", post(brainstorm::create_baseline))
        .route("/api/AUT_gpt", post(brainstorm::create_assisted))
        .route(
            "/api/task-post-survey",
            post(surveys::create_task_survey).get(surveys::list_task_surveys),
        )
        .route(
            "/api/task-post-survey/by-presurvey/:pre_survey_id",
            get(surveys::task_surveys_for_participant),
        )
        .route(
            "/api/task-post-survey/:id",
            get(surveys::get_task_survey)
                .put(surveys::update_task_survey)
                .delete(surveys::delete_task_survey),
        )
        .route("/api/PostSurvey", post(surveys::create_post_survey))
        .route("/api/openai", post(openai::complete))
        .route("/api/dbcheck", get(db_check))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::cors))
        .layer(axum::middleware::from_fn(middleware::log_requests))
}

/// `{success, message, data}` body used by the catalogue and assignment
/// routes.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    message: String,
    data: T,
}

fn envelope<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (
        status,
        Json(Envelope {
            success: true,
            message: message.into(),
            data,
        }),
    )
}

async fn db_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "message": "Database reachable" })),
        ),
        Err(err) => {
            tracing::error!("database health check failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": "Database unreachable" })),
            )
        }
    }
}
