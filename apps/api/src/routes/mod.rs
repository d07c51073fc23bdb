pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::artifacts::handlers as artifacts;
use crate::sessions::handlers as sessions;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route(
            "/api/v1/sessions",
            post(sessions::handle_create_session).get(sessions::handle_list_sessions),
        )
        .route("/api/v1/sessions/:id", get(sessions::handle_session_detail))
        .route(
            "/api/v1/sessions/:id/messages",
            post(sessions::handle_post_message),
        )
        .route("/api/v1/sessions/:id/end", post(sessions::handle_end_session))
        .route(
            "/api/v1/sessions/:id/analysis",
            get(sessions::handle_session_analysis),
        )
        .route(
            "/api/v1/sessions/:id/resume",
            get(sessions::handle_session_resume),
        )
        // Resumes
        .route("/api/v1/resumes/:id", get(artifacts::handle_get_resume))
        .route(
            "/api/v1/resumes/:id/template",
            patch(artifacts::handle_update_template),
        )
        .route(
            "/api/v1/resumes/:id/ats-score",
            get(artifacts::handle_ats_score),
        )
        .with_state(state)
}
