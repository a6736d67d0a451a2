//! HTTP handlers for the game page and its JSON/SSE endpoints.
//!
//! Session-bound routes (`/`, `/ask`, `/reset`) resolve the player's game
//! from the session cookie and always re-issue it, including on errors, so a
//! freshly created game stays bound to the browser.

use std::convert::Infallible;

use super::error::ApiError;
use super::page::render_game_page;
use super::AppState;
use crate::game::{validate_question, GameSession, QuestionRejection, MAX_QUESTIONS};
use crate::prompt::{build_context, build_transcript_prompt, ChatTurn};
use crate::providers::RelayChunk;
use crate::sessions::RecordOutcome;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, Sse},
        Html, IntoResponse, Json, Response,
    },
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};

// ── Session cookie ──────────────────────────────────────────────

/// Extract the session token from the `Cookie` header(s).
fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

fn session_cookie(cookie_name: &str, session: &GameSession) -> String {
    format!(
        "{cookie_name}={}; Path=/; HttpOnly; SameSite=Lax",
        session.id
    )
}

fn bound<R: IntoResponse>(state: &AppState, session: &GameSession, body: R) -> Response {
    (
        [(header::SET_COOKIE, session_cookie(&state.cookie_name, session))],
        body,
    )
        .into_response()
}

// ── Request/response bodies ─────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub success: bool,
    pub response: String,
    pub question_count: u32,
    pub max_questions: u32,
    pub is_completed: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub success: bool,
    pub message: &'static str,
    pub session_id: String,
    pub question_count: u32,
    pub is_completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Buffer the body (bounded by `DefaultBodyLimit`) and decode it as JSON.
fn parse_json<T: DeserializeOwned>(body: Result<Bytes, BytesRejection>) -> Result<T, ApiError> {
    let body = body?;
    serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Rejecting request body: {e}");
        ApiError::MalformedPayload
    })
}

// ── Handlers ────────────────────────────────────────────────────

/// GET /: the game page for the bound (or a new) session
pub async fn handle_index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers, &state.cookie_name);
    let session = match state.manager.get_or_create(token).await {
        Ok(session) => session,
        Err(e) => return ApiError::unexpected(e).into_response(),
    };

    match render_game_page(&session) {
        Ok(html) => bound(&state, &session, Html(html)),
        Err(e) => bound(&state, &session, ApiError::unexpected(e.into())),
    }
}

/// POST /ask: answer one question and record it
pub async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request: AskRequest = match parse_json(body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };
    let question = request.question.trim();
    if question.is_empty() {
        return ApiError::from(QuestionRejection::Empty).into_response();
    }

    let token = session_token(&headers, &state.cookie_name);
    let session = match state.manager.get_or_create(token).await {
        Ok(session) => session,
        Err(e) => return ApiError::unexpected(e).into_response(),
    };

    match ask_in_session(&state, &session, question).await {
        Ok(answer) => bound(&state, &session, Json(answer)),
        Err(e) => bound(&state, &session, e),
    }
}

async fn ask_in_session(
    state: &AppState,
    session: &GameSession,
    question: &str,
) -> Result<AskResponse, ApiError> {
    session.ensure_can_ask()?;
    validate_question(question)?;

    let context = build_context(session);
    let answer = state.relay.get_answer(&context, question).await?;

    match state
        .manager
        .record_exchange(&session.id, question, &answer)
        .await
        .map_err(ApiError::unexpected)?
    {
        RecordOutcome::Recorded(updated) => Ok(AskResponse {
            success: true,
            response: answer,
            question_count: updated.question_count,
            max_questions: MAX_QUESTIONS,
            is_completed: updated.is_completed,
            session_id: updated.id.to_string(),
        }),
        RecordOutcome::Rejected(err) => Err(err.into()),
        RecordOutcome::Missing => Err(ApiError::unexpected(anyhow::anyhow!(
            "session {} disappeared while answering",
            session.id
        ))),
    }
}

/// POST /reset: start the bound game over, keeping its id
pub async fn handle_reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers, &state.cookie_name);
    match state.manager.reset(token).await {
        Ok(session) => {
            let body = ResetResponse {
                success: true,
                message: "Game reset successfully",
                session_id: session.id.to_string(),
                question_count: session.question_count,
                is_completed: session.is_completed,
            };
            bound(&state, &session, Json(body))
        }
        Err(e) => ApiError::reset_failed(e).into_response(),
    }
}

/// POST /ask-stream: stateless streamed answer for a client-held transcript
pub async fn handle_ask_stream(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request: StreamRequest = parse_json(body)?;
    if request.history.is_empty() {
        return Err(ApiError::Validation("History is required".into()));
    }
    let prompt = build_transcript_prompt(&request.history)?;

    let events = state
        .relay
        .stream_prompt(prompt)
        .map(|chunk| Ok::<_, Infallible>(chunk_event(chunk)))
        .chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))));

    Ok(Sse::new(events))
}

fn chunk_event(chunk: RelayChunk) -> Event {
    let payload = match chunk {
        RelayChunk::Fragment(content) => serde_json::json!({ "content": content }),
        RelayChunk::Done { answer, prompt } => serde_json::json!({
            "type": "debug",
            "full_prompt": prompt,
            "full_response": answer,
        }),
        RelayChunk::Failed(err) => {
            let err = ApiError::from(err);
            tracing::error!(detail = ?err, "Streamed answer failed");
            err.envelope()
        }
    };
    Event::default().data(payload.to_string())
}

/// GET /test-backend: check the inference server is reachable
pub async fn handle_test_backend(State(state): State<AppState>) -> Response {
    let relay = &state.relay;
    match relay.probe().await {
        Ok(models) => Json(serde_json::json!({
            "status": "success",
            "message": "Ollama is accessible",
            "ollamaUrl": relay.endpoint(),
            "model": relay.model(),
            "availableModels": models,
        }))
        .into_response(),
        Err(err) => {
            tracing::warn!(url = relay.endpoint(), "Backend probe failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "status": "error",
                    "message": format!("Cannot connect to Ollama: {}", err.detail()),
                    "ollamaUrl": relay.endpoint(),
                    "model": relay.model(),
                })),
            )
                .into_response()
        }
    }
}
