use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::recommendation::scorer::ScoreVector;

/// One answer as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmittedResponse {
    pub question_id: i64,
    pub selected_option_id: i64,
    pub response_time_ms: i64,
}

/// Stored recommendation for a questionnaire session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecommendationRecord {
    pub id: i64,
    pub session_id: String,
    /// Catalog order is kept on the wire and in storage.
    pub scores: Json<ScoreVector>,
    pub recommended_course_key: String,
    pub recommended_course: String,
    pub confidence_score: f64,
    pub model_version: String,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub session_id: String,
    pub scores: ScoreVector,
    pub recommended_course_key: String,
    pub recommended_course: String,
    pub confidence_score: f64,
    pub model_version: String,
    pub processing_time_ms: i64,
}

/// Filters for result analytics. All bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Course key or display name.
    pub course: Option<String>,
}

impl ResultFilter {
    pub fn matches(&self, record: &RecommendationRecord) -> bool {
        self.start_date.map_or(true, |s| record.created_at >= s)
            && self.end_date.map_or(true, |e| record.created_at <= e)
            && self.course.as_deref().map_or(true, |c| {
                record.recommended_course_key == c || record.recommended_course == c
            })
    }
}
