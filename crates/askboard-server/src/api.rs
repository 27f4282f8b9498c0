// HTTP routes: maps verbs and paths onto question store operations.

use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, Level};

use askboard_core::{BoardEvent, Question, QuestionStore, Reply, StoreError};

use crate::config::ApiOptions;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<QuestionStore>,
    pub events: broadcast::Sender<BoardEvent>,
    pub options: ApiOptions,
    /// Held across a store mutation and its event so the feed sees changes
    /// in the order the store applied them.
    publish_order: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        store: Arc<QuestionStore>,
        events: broadcast::Sender<BoardEvent>,
        options: ApiOptions,
    ) -> Self {
        AppState {
            store,
            events,
            options,
            publish_order: Arc::new(Mutex::new(())),
        }
    }

    /// Run a store mutation and publish the event it produced as one step.
    ///
    /// `broadcast::Sender::send` never blocks, so sending under the lock is
    /// fine. Nothing inside `change` may await.
    fn mutate<T>(&self, change: impl FnOnce(&QuestionStore) -> (T, Option<BoardEvent>)) -> T {
        let _order = self
            .publish_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (outcome, event) = change(&self.store);
        if let Some(event) = event {
            self.publish(event);
        }
        outcome
    }

    /// Announce a change to realtime clients. Having no subscribers is normal.
    fn publish(&self, event: BoardEvent) {
        let kind = event.kind();
        match self.events.send(event) {
            Ok(receivers) => debug!(kind, receivers, "event published"),
            Err(_) => debug!(kind, "event dropped, no subscribers"),
        }
    }

    /// Apply the blank-text policy to submitted text.
    fn accept_text(&self, text: String) -> Result<String, ApiError> {
        if !self.options.reject_blank_text {
            return Ok(text);
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ApiError::BlankText);
        }
        Ok(trimmed.to_string())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Text is required")]
    BlankText,

    #[error(transparent)]
    InvalidBody(#[from] JsonRejection),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::Store(StoreError::QuestionNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Question not found".to_string())
            }
            ApiError::BlankText => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::InvalidBody(rejection) => (rejection.status(), rejection.body_text()),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of both question and reply submissions. A missing `text` is empty.
#[derive(Debug, Default, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

/// Submitted body, with axum's rejection kept so it can be answered as JSON.
type TextBody = Result<Json<TextRequest>, JsonRejection>;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    time: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/questions",
            get(list_questions)
                .post(create_question)
                .delete(clear_questions),
        )
        .route("/api/questions/{question_id}", delete(delete_question))
        .route("/api/questions/{question_id}/replies", post(add_reply))
        .route(
            "/api/questions/{question_id}/replies/{reply_id}",
            delete(delete_reply),
        )
        .layer(cors)
        .layer(trace)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        time: Utc::now().to_rfc3339(),
    })
}

async fn list_questions(State(state): State<AppState>) -> Json<Vec<Question>> {
    Json(state.store.list())
}

async fn create_question(
    State(state): State<AppState>,
    body: TextBody,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let Json(body) = body?;
    let text = state.accept_text(body.text)?;
    let question = state.mutate(|store| {
        let question = store.create_question(text);
        let event = BoardEvent::QuestionCreated(question.clone());
        (question, Some(event))
    });
    Ok((StatusCode::CREATED, Json(question)))
}

async fn add_reply(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
    body: TextBody,
) -> Result<(StatusCode, Json<Reply>), ApiError> {
    let Json(body) = body?;
    let reply: Result<Reply, ApiError> = state.mutate(|store| {
        // Unknown question wins over blank text, matching lookup-then-validate.
        if !store.contains(&question_id) {
            let err = StoreError::QuestionNotFound {
                id: question_id.clone(),
            };
            return (Err(ApiError::from(err)), None);
        }
        let added = state
            .accept_text(body.text)
            .and_then(|text| store.add_reply(&question_id, text).map_err(ApiError::from));
        match added {
            Ok(reply) => {
                let event = BoardEvent::ReplyAdded {
                    question_id: question_id.clone(),
                    reply: reply.clone(),
                };
                (Ok(reply), Some(event))
            }
            Err(e) => (Err(e), None),
        }
    });
    Ok((StatusCode::CREATED, Json(reply?)))
}

async fn delete_question(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
) -> StatusCode {
    state.mutate(|store| {
        let event = store
            .delete_question(&question_id)
            .then(|| BoardEvent::QuestionDeleted {
                question_id: question_id.clone(),
            });
        ((), event)
    });
    StatusCode::NO_CONTENT
}

async fn delete_reply(
    State(state): State<AppState>,
    Path((question_id, reply_id)): Path<(String, String)>,
) -> StatusCode {
    state.mutate(|store| {
        let event = store
            .delete_reply(&question_id, &reply_id)
            .then(|| BoardEvent::ReplyDeleted {
                question_id: question_id.clone(),
                reply_id: reply_id.clone(),
            });
        ((), event)
    });
    StatusCode::NO_CONTENT
}

async fn clear_questions(State(state): State<AppState>) -> StatusCode {
    state.mutate(|store| {
        let removed = store.clear_all_questions();
        ((), Some(BoardEvent::QuestionsCleared { removed }))
    });
    StatusCode::NO_CONTENT
}
