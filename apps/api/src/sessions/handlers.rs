use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::artifact::{CareerAnalysis, Resume, ResumeTemplate};
use crate::models::session::{Session, SessionKind};
use crate::sessions::engine::SessionDetail;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
    pub kind: String,
    pub title: Option<String>,
    /// Resume sessions only; ignored for career sessions.
    pub template: Option<String>,
}

#[derive(Deserialize)]
pub struct ListSessionsQuery {
    pub user_id: Uuid,
    pub kind: String,
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct PostMessageRequest {
    pub user_id: Uuid,
    pub content: String,
}

#[derive(Deserialize)]
pub struct EndSessionRequest {
    pub user_id: Uuid,
}

fn parse_kind(raw: &str) -> Result<SessionKind, AppError> {
    SessionKind::parse(raw).ok_or_else(|| {
        AppError::Validation(format!(
            "Unknown session kind '{raw}'. Expected 'career' or 'resume'"
        ))
    })
}

fn parse_template(raw: Option<&str>) -> Result<Option<ResumeTemplate>, AppError> {
    raw.map(|t| {
        ResumeTemplate::parse(t)
            .ok_or_else(|| AppError::Validation(format!("Unknown template '{t}'")))
    })
    .transpose()
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let kind = parse_kind(&req.kind)?;
    let template = match kind {
        SessionKind::Resume => parse_template(req.template.as_deref())?,
        SessionKind::Career => None,
    };
    let session = state
        .engine
        .create_session(req.user_id, kind, req.title.as_deref(), template)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions?user_id&kind
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, AppError> {
    let kind = parse_kind(&params.kind)?;
    let sessions = state.engine.list_sessions(params.user_id, kind).await?;
    Ok(Json(sessions))
}

/// GET /api/v1/sessions/:id
pub async fn handle_session_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<SessionDetail>, AppError> {
    let detail = state.engine.session_detail(params.user_id, id).await?;
    Ok(Json(detail))
}

/// POST /api/v1/sessions/:id/messages
///
/// Rejections (ownership, lifecycle, ceiling) are plain HTTP errors. Once the
/// user message is committed the reply is a `text/event-stream`.
pub async fn handle_post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let turn = state
        .engine
        .post_message(req.user_id, id, &req.content)
        .await?;
    info!(
        "Streaming reply for session {id} (turn {}, forced: {})",
        turn.session.turn_count, turn.force_artifact
    );

    let events = state.coordinator.start(turn);
    let stream = UnboundedReceiverStream::new(events).map(|e| Ok::<_, Infallible>(e.into_sse()));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

/// POST /api/v1/sessions/:id/end
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state.engine.end_explicitly(req.user_id, id).await?;
    Ok(Json(session))
}

/// GET /api/v1/sessions/:id/analysis
pub async fn handle_session_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<CareerAnalysis>, AppError> {
    let analysis = state.engine.career_analysis(params.user_id, id).await?;
    Ok(Json(analysis))
}

/// GET /api/v1/sessions/:id/resume
pub async fn handle_session_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Resume>, AppError> {
    let resume = state.engine.resume_for_session(params.user_id, id).await?;
    Ok(Json(resume))
}
