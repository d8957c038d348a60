//! Axum route handlers for the Refinement API.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::debug;

use crate::errors::AppError;
use crate::job_description::resolver::resolve_job_description;
use crate::llm_client::StreamEvent;
use crate::refinement::refiner::{refine, spawn_refine_stream};
use crate::refinement::sanitizer::{count_input_bullets, sanitize_bullets, SanitizerConfig};
use crate::refinement::session::{ChatTurn, RefinementSession, TurnRole};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    pub job_description: Option<String>,
    pub job_description_url: Option<String>,
    pub resume_bullets: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineResponse {
    pub optimized_bullets: String,
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRefineRequest {
    pub job_description: Option<String>,
    pub current_bullets: Option<String>,
    /// Completed turns so far, followed by the new user message.
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRefineResponse {
    pub refined_bullets: String,
    pub response: String,
    pub chat_history: Vec<ChatTurn>,
}

/// Inputs shared by the single-shot and streaming refine endpoints.
struct PreparedRefinement {
    job_description: String,
    bullets: String,
    model: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/refine
///
/// Resolves the job description, generates tailored bullets and deduplicates them.
pub async fn handle_refine(
    State(state): State<AppState>,
    Json(request): Json<RefineRequest>,
) -> Result<Json<RefineResponse>, AppError> {
    let prepared = prepare(&state, request).await?;

    let sanitized = refine(
        state.llm.as_ref(),
        &prepared.job_description,
        &prepared.bullets,
        &prepared.model,
        &state.config.sanitizer,
    )
    .await?;

    Ok(Json(RefineResponse {
        optimized_bullets: sanitized.render(),
        job_description: prepared.job_description,
    }))
}

/// POST /api/v1/refine/stream
///
/// Same inputs as `/refine`, answered as server-sent events. Input errors are
/// reported as JSON before the stream opens; later failures arrive as an `error` event.
pub async fn handle_refine_stream(
    State(state): State<AppState>,
    Json(request): Json<RefineRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let prepared = prepare(&state, request).await?;

    let original_count = count_input_bullets(&prepared.bullets);
    let sanitizer = state.config.sanitizer.clone();

    let rx = spawn_refine_stream(
        state.llm.clone(),
        &prepared.job_description,
        &prepared.bullets,
        &prepared.model,
    );

    let stream = ReceiverStream::new(rx)
        .map(move |event| Ok::<_, Infallible>(to_sse_event(event, original_count, &sanitizer)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /api/v1/refine/chat
///
/// Runs one conversational turn. The last history entry is the new user message;
/// the response carries the history extended with the assistant's reply.
pub async fn handle_chat_refine(
    State(state): State<AppState>,
    Json(request): Json<ChatRefineRequest>,
) -> Result<Json<ChatRefineResponse>, AppError> {
    let bullets = require_text(
        request.current_bullets.as_deref(),
        "Current bullets are required",
    )?
    .to_string();

    let mut history = request.chat_history;
    let message = match history.pop() {
        Some(turn) if turn.role == TurnRole::User => turn.content,
        Some(_) => {
            return Err(AppError::Validation(
                "The last chat history entry must be a user message".to_string(),
            ))
        }
        None => return Err(AppError::MissingInput("Chat history is required".to_string())),
    };

    let model = select_model(&state, request.model.as_deref());
    let mut session = RefinementSession::restore(
        request.job_description.unwrap_or_default(),
        model,
        bullets,
        history,
    );

    let result = session.send(state.llm.as_ref(), &message).await?;
    debug!(
        "Chat session now holds {} turns ({:?})",
        session.history().len(),
        session.state()
    );

    Ok(Json(ChatRefineResponse {
        refined_bullets: session.bullets().unwrap_or(result.bullets.as_str()).to_string(),
        response: result.explanation,
        chat_history: session.into_history(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn prepare(state: &AppState, request: RefineRequest) -> Result<PreparedRefinement, AppError> {
    let bullets = require_text(
        request.resume_bullets.as_deref(),
        "Resume bullet points are required",
    )?
    .to_string();

    let job_description = resolve_job_description(
        state.scraper.as_ref(),
        request.job_description.as_deref(),
        request.job_description_url.as_deref(),
    )
    .await?;

    Ok(PreparedRefinement {
        job_description,
        bullets,
        model: select_model(state, request.model.as_deref()),
    })
}

fn require_text<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::MissingInput(message.to_string()))
}

fn select_model(state: &AppState, requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(state.config.default_model.as_str())
        .to_string()
}

fn to_sse_event(event: StreamEvent, original_count: usize, sanitizer: &SanitizerConfig) -> Event {
    match event {
        StreamEvent::Fragment(content) => {
            Event::default().data(json!({ "content": content, "done": false }).to_string())
        }
        StreamEvent::Done { full_text } => {
            let optimized = sanitize_bullets(&full_text, Some(original_count), sanitizer).render();
            Event::default().data(
                json!({
                    "content": "",
                    "done": true,
                    "fullContent": full_text,
                    "optimizedBullets": optimized,
                })
                .to_string(),
            )
        }
        StreamEvent::Failed(message) => Event::default()
            .event("error")
            .data(AppError::Upstream(message).body().to_string()),
    }
}
