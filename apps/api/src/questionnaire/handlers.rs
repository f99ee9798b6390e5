//! Axum route handlers for the public questionnaire API.

use std::time::Instant;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::question::Question;
use crate::models::result::{NewRecommendation, RecommendationRecord, SubmittedResponse};
use crate::questionnaire::seed::seed_sample_questions;
use crate::questionnaire::validation::validate_submission;
use crate::recommendation::scorer::Response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub session_id: String,
    pub responses: Vec<SubmittedResponse>,
}

/// GET /api/v1/questionnaire/questions
pub async fn handle_list_questions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Question>>, AppError> {
    let questions = state.repo.list_questions(true).await?;
    if !questions.is_empty() {
        return Ok(Json(questions));
    }

    seed_sample_questions(state.repo.as_ref()).await?;
    Ok(Json(state.repo.list_questions(true).await?))
}

/// POST /api/v1/questionnaire/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<RecommendationRecord>, AppError> {
    let start = Instant::now();
    validate_submission(&req.session_id, &req.responses)?;

    let mut scored = Vec::with_capacity(req.responses.len());
    for answer in &req.responses {
        let question = state
            .repo
            .get_question(answer.question_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("Question {} not found", answer.question_id))
            })?;
        let option = question.option(answer.selected_option_id).ok_or_else(|| {
            AppError::Validation(format!(
                "Option {} not found for question {}",
                answer.selected_option_id, answer.question_id
            ))
        })?;
        scored.push(Response {
            question_id: answer.question_id,
            selected_option_id: answer.selected_option_id,
            response_time_ms: answer.response_time_ms,
            weights: option.weights.clone(),
        });
    }

    let result = state.scorer.classify(&scored);

    let record = state
        .repo
        .save_submission(
            &req.responses,
            NewRecommendation {
                session_id: req.session_id.clone(),
                scores: result.scores,
                recommended_course_key: result.recommended_course,
                recommended_course: result.recommended_course_name,
                confidence_score: result.confidence_score,
                model_version: result.model_version,
                processing_time_ms: start.elapsed().as_millis() as i64,
            },
        )
        .await?;

    info!(
        "Session {} → {} (confidence {:.2})",
        record.session_id, record.recommended_course_key, record.confidence_score
    );
    Ok(Json(record))
}

/// GET /api/v1/questionnaire/result/:session_id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<RecommendationRecord>, AppError> {
    state
        .repo
        .latest_result(&session_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Result for session {session_id} not found")))
}
