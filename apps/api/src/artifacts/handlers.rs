use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::ats::AtsReport;
use crate::errors::AppError;
use crate::models::artifact::Resume;
use crate::sessions::handlers::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TemplateUpdate {
    pub user_id: Uuid,
    pub template: String,
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Resume>, AppError> {
    let resume = state.engine.resume(params.user_id, id).await?;
    Ok(Json(resume))
}

/// PATCH /api/v1/resumes/:id/template
pub async fn handle_update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TemplateUpdate>,
) -> Result<Json<Resume>, AppError> {
    let resume = state
        .engine
        .update_resume_template(req.user_id, id, &req.template)
        .await?;
    info!("Resume {id} switched to template {}", resume.template.as_str());
    Ok(Json(resume))
}

/// GET /api/v1/resumes/:id/ats-score
///
/// Always answers once the resume exists; the semantic half degrades to grade C.
pub async fn handle_ats_score(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<AtsReport>, AppError> {
    let resume = state.engine.resume(params.user_id, id).await?;
    let report = state.ats.score(&resume.resume_json).await;
    info!(
        "ATS score for resume {id}: {}/{} (deterministic {}, semantic {})",
        report.total_score, report.max_score, report.deterministic_total, report.semantic_total
    );
    Ok(Json(report))
}
