//! Axum routes for the narrative service.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::NarrativeError;
use crate::replay::{open_shared_path, ReplayCancel, ReplayEngine, ReplayStatus, SharedPathEntry};
use crate::session::{
    ReaderAction, ReadingSession, SessionMode, SessionOutcome, SessionParams, SessionState,
    UnavailableAction, Unavailability,
};
use crate::store::NarrativeStore;
use crate::types::{ChoiceId, PartId, PartNode, ReaderId, StoryId};
use crate::NARRATIVE_SCHEMA_VERSION;

use super::middleware::record_session_event;
use super::state::ServiceState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to start a reading session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    /// Who is reading.
    pub reader_id: ReaderId,
    /// Story to read.
    pub story_id: StoryId,
    /// Author preview: never touches reader progress.
    #[serde(default)]
    pub preview: bool,
}

/// Request to pick a choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseRequest {
    /// Choice to apply.
    pub choice_id: ChoiceId,
}

/// Request to replay a shared path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// Who is watching.
    pub reader_id: ReaderId,
    /// Story the path belongs to.
    pub story_id: StoryId,
    /// Transit-encoded path.
    pub path: String,
}

/// A presented part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartView {
    /// Part identifier.
    pub part_id: PartId,
    /// Text to display.
    pub content: String,
    /// Author-flagged ending.
    pub is_ending: bool,
}

impl PartView {
    fn new(node: &PartNode, content: &str) -> Self {
        Self {
            part_id: node.id(),
            content: content.to_string(),
            is_ending: node.part.is_ending,
        }
    }
}

/// Why a session has nothing to present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableView {
    /// Reason.
    #[serde(flatten)]
    pub reason: Unavailability,
    /// Message for the reader.
    pub message: String,
    /// Offered actions.
    pub actions: Vec<UnavailableAction>,
}

/// Snapshot of a reading session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    /// Session handle. Absent when the story cannot be read, since such a
    /// session accepts no further actions and is never registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// State name.
    pub state: String,
    /// Story being read.
    pub story_id: StoryId,
    /// Reading or preview.
    pub mode: SessionMode,
    /// Part on screen, when presenting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<PartView>,
    /// Actions on the presented part.
    pub actions: Vec<ReaderAction>,
    /// Set when the story cannot be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<UnavailableView>,
    /// Set once the story is finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SessionOutcome>,
    /// Transit encoding of the finished path, for sharing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_path: Option<String>,
    /// Number of recorded path entries.
    pub path_len: usize,
}

impl SessionView {
    fn from_session<S: NarrativeStore>(session_id: Option<Uuid>, session: &ReadingSession<S>) -> Self {
        let params = session.params();
        let part = session.current_node().map(|node| PartView::new(node, node.content()));
        let unavailable = match session.state() {
            SessionState::Unavailable(reason) => Some(UnavailableView {
                reason: *reason,
                message: reason.message().to_string(),
                actions: reason.actions(),
            }),
            _ => None,
        };
        let outcome = session.outcome().cloned();
        let shared_path = outcome.as_ref().and_then(|o| o.path.encode().ok());

        Self {
            session_id,
            state: session.state().name().to_string(),
            story_id: params.story_id,
            mode: params.mode,
            part,
            actions: session.available_actions(),
            unavailable,
            outcome,
            shared_path,
            path_len: session.path().len(),
        }
    }
}

/// Result of auto-playing a shared path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayView {
    /// Where replay stopped.
    pub status: ReplayStatus,
    /// Part on screen.
    pub part: PartView,
    /// Choices available if replay stopped in manual mode.
    pub actions: Vec<ReaderAction>,
    /// Parts visited during replay, in order.
    pub visits: Vec<PartId>,
    /// Fingerprint of the replayed trace.
    pub trace_fingerprint: String,
    /// Whether the replay reproduced the recording exactly.
    pub matches_recording: bool,
}

impl ReplayView {
    fn from_engine<S: NarrativeStore>(engine: &ReplayEngine<S>) -> Self {
        let node = engine.node();
        let actions = if engine.status().is_manual() {
            node.choices
                .iter()
                .map(|c| ReaderAction::Choose { choice_id: c.id, text: c.text.clone() })
                .collect()
        } else {
            Vec::new()
        };
        let trace_fingerprint = engine.trace().trace_fingerprint();

        Self {
            status: *engine.status(),
            part: PartView::new(node, engine.display_content()),
            actions,
            visits: engine.trace().visits(),
            matches_recording: trace_fingerprint == engine.recorded().trace_fingerprint(),
            trace_fingerprint,
        }
    }
}

/// Replay endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayResponse {
    /// The path was replayed.
    Replay(ReplayView),
    /// The path was unusable; a fresh session was started instead.
    Fresh(SessionView),
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub active_sessions: usize,
    /// Store connectivity status.
    pub store: bool,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store: bool,
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Whether retrying the same request may succeed.
    pub retryable: bool,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            retryable: false,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_for(e: &NarrativeError) -> StatusCode {
    match e {
        NarrativeError::StoryNotFound(_) | NarrativeError::PartNotFound(_) => StatusCode::NOT_FOUND,
        NarrativeError::GraphIncomplete(_) => StatusCode::UNPROCESSABLE_ENTITY,
        NarrativeError::PersistenceFailure(_) | NarrativeError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        NarrativeError::MalformedRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
        NarrativeError::ReplayDesync { .. } | NarrativeError::InvalidAction(_) => StatusCode::CONFLICT,
        NarrativeError::PathDecode(_) => StatusCode::BAD_REQUEST,
    }
}

fn api_error(e: NarrativeError) -> ApiError {
    let status = status_for(&e);
    let body = ErrorResponse {
        error: e.to_string(),
        code: e.code().to_string(),
        retryable: e.is_transient(),
    };
    tracing::warn!(code = %body.code, error = %body.error, status = status.as_u16(), "Request error");
    (status, Json(body))
}

fn session_not_found(id: Uuid) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("SESSION_NOT_FOUND", format!("Session not found: {id}"))),
    )
}

type AppState<S> = Arc<ServiceState<S>>;

// ============================================================================
// Route Handlers
// ============================================================================

/// Start a reading (or preview) session.
async fn start_session_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let params = if request.preview {
        SessionParams::preview(request.reader_id, request.story_id)
    } else {
        SessionParams::reading(request.reader_id, request.story_id)
    };

    let session = ReadingSession::start(Arc::clone(&state.store), params)
        .await
        .map_err(api_error)?;
    record_session_event("start", session.state().name());

    Ok((StatusCode::CREATED, Json(register(&state, session))))
}

/// Register a new session and snapshot it. Unavailable sessions are only
/// snapshotted.
fn register<S: NarrativeStore>(state: &ServiceState<S>, session: ReadingSession<S>) -> SessionView {
    let view = SessionView::from_session(None, &session);
    if matches!(session.state(), SessionState::Unavailable(_)) {
        return view;
    }
    SessionView { session_id: Some(state.sessions.insert(session)), ..view }
}

/// Current snapshot of a session.
async fn get_session_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.sessions.get(&session_id).ok_or_else(|| session_not_found(session_id))?;
    let session = handle.lock().await;
    Ok(Json(SessionView::from_session(Some(session_id), &session)))
}

/// Apply a choice.
async fn choose_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ChooseRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.sessions.get(&session_id).ok_or_else(|| session_not_found(session_id))?;
    let mut session = handle.lock().await;
    session.choose(request.choice_id).await.map_err(api_error)?;
    record_session_event("choose", session.state().name());
    Ok(Json(SessionView::from_session(Some(session_id), &session)))
}

/// Finish from a finish-only part.
async fn finish_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.sessions.get(&session_id).ok_or_else(|| session_not_found(session_id))?;
    let mut session = handle.lock().await;
    session.finish().await.map_err(api_error)?;
    record_session_event("finish", session.state().name());
    Ok(Json(SessionView::from_session(Some(session_id), &session)))
}

/// Restart from the start node.
async fn restart_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.sessions.get(&session_id).ok_or_else(|| session_not_found(session_id))?;
    let mut session = handle.lock().await;
    session.restart().await.map_err(api_error)?;
    record_session_event("restart", session.state().name());
    Ok(Json(SessionView::from_session(Some(session_id), &session)))
}

/// Leave a session.
async fn close_session_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(session_id))
    }
}

/// Replay a shared path without delay.
///
/// Unusable payloads start a fresh session, which is registered like any
/// other new session.
async fn replay_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<ReplayRequest>,
) -> Result<Json<ReplayResponse>, ApiError> {
    let params = SessionParams::reading(request.reader_id, request.story_id);
    let config = state.config.clone().with_replay_delay(Duration::ZERO);

    let entry = open_shared_path(Arc::clone(&state.store), params, &request.path, &config)
        .await
        .map_err(api_error)?;

    match entry {
        SharedPathEntry::Replay(mut engine) => {
            engine.run(&ReplayCancel::new()).await.map_err(api_error)?;
            record_session_event("replay", engine.status().name());
            Ok(Json(ReplayResponse::Replay(ReplayView::from_engine(&engine))))
        }
        SharedPathEntry::Fresh(session) => {
            record_session_event("replay_fallback", session.state().name());
            Ok(Json(ReplayResponse::Fresh(register(&state, session))))
        }
    }
}

/// Health check endpoint (detailed).
async fn health_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    let store_healthy = state.store.is_healthy().await;

    Json(HealthResponse {
        status: if store_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: NARRATIVE_SCHEMA_VERSION.to_string(),
        active_sessions: state.sessions.len(),
        store: store_healthy,
    })
}

/// Liveness probe endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store is reachable, 503 otherwise.
async fn readiness_handler<S: NarrativeStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.store.is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            store: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                store: false,
                details: Some("Store connection failed".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the narrative service.
pub fn create_router<S: NarrativeStore>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Reading sessions
        .route("/api/sessions", post(start_session_handler::<S>))
        .route(
            "/api/sessions/:id",
            get(get_session_handler::<S>).delete(close_session_handler::<S>),
        )
        .route("/api/sessions/:id/choose", post(choose_handler::<S>))
        .route("/api/sessions/:id/finish", post(finish_handler::<S>))
        .route("/api/sessions/:id/restart", post(restart_handler::<S>))
        // Shared paths
        .route("/api/replay", post(replay_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
}
