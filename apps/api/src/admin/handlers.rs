//! Axum route handlers for the admin API. Every handler takes `AdminAuth`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{TimeZone, Utc};

use crate::admin::analytics::{dashboard_stats, summarize_results, DashboardStats, ResultAnalytics};
use crate::admin::auth::AdminAuth;
use crate::errors::AppError;
use crate::models::question::{DeleteOutcome, NewQuestion, Question, QuestionUpdate};
use crate::models::result::ResultFilter;
use crate::questionnaire::validation::{validate_new_question, validate_update};
use crate::recommendation::model_store::ModelInfo;
use crate::state::AppState;

fn question_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Question {id} not found"))
}

/// GET /api/v1/admin/questions
pub async fn handle_list_questions(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(state.repo.list_questions(false).await?))
}

/// GET /api/v1/admin/questions/:id
pub async fn handle_get_question(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Question>, AppError> {
    state
        .repo
        .get_question(id)
        .await?
        .map(Json)
        .ok_or_else(|| question_not_found(id))
}

/// POST /api/v1/admin/questions
pub async fn handle_create_question(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<NewQuestion>,
) -> Result<(StatusCode, Json<Question>), AppError> {
    let question = validate_new_question(state.scorer.catalog(), req)?;
    let created = state.repo.create_question(question).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/v1/admin/questions/:id
pub async fn handle_update_question(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<QuestionUpdate>,
) -> Result<Json<Question>, AppError> {
    let update = validate_update(state.scorer.catalog(), req)?;
    state
        .repo
        .update_question(id, update)
        .await?
        .map(Json)
        .ok_or_else(|| question_not_found(id))
}

/// DELETE /api/v1/admin/questions/:id
pub async fn handle_delete_question(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteOutcome>, AppError> {
    state
        .repo
        .delete_question(id)
        .await?
        .map(Json)
        .ok_or_else(|| question_not_found(id))
}

/// GET /api/v1/admin/dashboard
pub async fn handle_dashboard(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    let midnight = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| Utc.from_utc_datetime(&t))
        .ok_or_else(|| anyhow::anyhow!("midnight is not representable"))?;
    let total_responses = state.repo.count_responses(None).await?;
    let responses_today = state.repo.count_responses(Some(midnight)).await?;
    let results = state.repo.list_results(&ResultFilter::default()).await?;
    Ok(Json(dashboard_stats(&results, total_responses, responses_today)))
}

/// GET /api/v1/admin/responses
pub async fn handle_result_analytics(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Query(filter): Query<ResultFilter>,
) -> Result<Json<ResultAnalytics>, AppError> {
    let results = state.repo.list_results(&filter).await?;
    Ok(Json(summarize_results(&results)))
}

/// GET /api/v1/admin/model
pub async fn handle_model_info(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Json<ModelInfo> {
    Json(state.model_info.clone())
}
