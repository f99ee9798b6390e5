pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::admin::handlers as admin;
use crate::questionnaire::handlers as questionnaire;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Questionnaire API
        .route(
            "/api/v1/questionnaire/questions",
            get(questionnaire::handle_list_questions),
        )
        .route(
            "/api/v1/questionnaire/submit",
            post(questionnaire::handle_submit),
        )
        .route(
            "/api/v1/questionnaire/result/:session_id",
            get(questionnaire::handle_get_result),
        )
        // Admin API
        .route(
            "/api/v1/admin/questions",
            get(admin::handle_list_questions).post(admin::handle_create_question),
        )
        .route(
            "/api/v1/admin/questions/:id",
            get(admin::handle_get_question)
                .put(admin::handle_update_question)
                .delete(admin::handle_delete_question),
        )
        .route("/api/v1/admin/dashboard", get(admin::handle_dashboard))
        .route("/api/v1/admin/responses", get(admin::handle_result_analytics))
        .route("/api/v1/admin/model", get(admin::handle_model_info))
        .with_state(state)
}
