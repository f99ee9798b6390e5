use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::result::RecommendationRecord;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub total_responses: i64,
    pub responses_today: i64,
    pub total_results: usize,
    /// Display name of the most frequent recommendation; `None` before any result.
    pub most_recommended_course: Option<String>,
    pub average_confidence: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultSummary {
    pub id: i64,
    pub session_id: String,
    pub recommended_course: String,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultAnalytics {
    pub total_results: usize,
    /// Display name → number of results.
    pub course_distribution: BTreeMap<String, usize>,
    pub average_confidence: f64,
    pub average_processing_time: f64,
    pub results: Vec<ResultSummary>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn course_distribution(results: &[RecommendationRecord]) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for r in results {
        *distribution.entry(r.recommended_course.clone()).or_insert(0) += 1;
    }
    distribution
}

pub fn summarize_results(results: &[RecommendationRecord]) -> ResultAnalytics {
    ResultAnalytics {
        total_results: results.len(),
        course_distribution: course_distribution(results),
        average_confidence: round2(mean(results.iter().map(|r| r.confidence_score))),
        average_processing_time: round2(mean(
            results.iter().map(|r| r.processing_time_ms as f64),
        )),
        results: results
            .iter()
            .map(|r| ResultSummary {
                id: r.id,
                session_id: r.session_id.clone(),
                recommended_course: r.recommended_course.clone(),
                confidence_score: r.confidence_score,
                created_at: r.created_at,
            })
            .collect(),
    }
}

/// Ties on frequency resolve to the alphabetically first course name.
pub fn dashboard_stats(
    results: &[RecommendationRecord],
    total_responses: i64,
    responses_today: i64,
) -> DashboardStats {
    let most_recommended_course = course_distribution(results)
        .into_iter()
        .fold(None::<(String, usize)>, |best, (course, count)| match best {
            Some((_, c)) if count <= c => best,
            _ => Some((course, count)),
        })
        .map(|(course, _)| course);

    DashboardStats {
        total_responses,
        responses_today,
        total_results: results.len(),
        most_recommended_course,
        average_confidence: round2(mean(results.iter().map(|r| r.confidence_score))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn record(id: i64, course: &str, confidence: f64, ms: i64) -> RecommendationRecord {
        RecommendationRecord {
            id,
            session_id: format!("s{id}"),
            scores: Json(Default::default()),
            recommended_course_key: course.to_lowercase(),
            recommended_course: course.to_string(),
            confidence_score: confidence,
            model_version: "1.0.0".to_string(),
            processing_time_ms: ms,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_of_no_results_is_zeroed() {
        let a = summarize_results(&[]);
        assert_eq!(a.total_results, 0);
        assert!(a.course_distribution.is_empty());
        assert_eq!(a.average_confidence, 0.0);
        assert_eq!(a.average_processing_time, 0.0);
    }

    #[test]
    fn test_summary_distribution_and_averages() {
        let results = vec![
            record(1, "Enfermagem", 0.3, 4),
            record(2, "Enfermagem", 0.5, 6),
            record(3, "Estética", 0.25, 5),
        ];
        let a = summarize_results(&results);
        assert_eq!(a.total_results, 3);
        assert_eq!(a.course_distribution["Enfermagem"], 2);
        assert_eq!(a.course_distribution["Estética"], 1);
        assert_eq!(a.average_confidence, 0.35);
        assert_eq!(a.average_processing_time, 5.0);
        assert_eq!(a.results[2].session_id, "s3");
    }

    #[test]
    fn test_dashboard_most_recommended() {
        let results = vec![
            record(1, "Logística", 0.2, 1),
            record(2, "Administração", 0.4, 1),
            record(3, "Logística", 0.6, 1),
        ];
        let stats = dashboard_stats(&results, 9, 3);
        assert_eq!(stats.most_recommended_course.as_deref(), Some("Logística"));
        assert_eq!(stats.total_responses, 9);
        assert_eq!(stats.responses_today, 3);
        assert_eq!(stats.average_confidence, 0.4);
    }

    #[test]
    fn test_dashboard_tie_picks_first_name() {
        let results = vec![record(1, "Estética", 0.5, 1), record(2, "Administração", 0.5, 1)];
        let stats = dashboard_stats(&results, 2, 0);
        assert_eq!(stats.most_recommended_course.as_deref(), Some("Administração"));
        assert!(dashboard_stats(&[], 0, 0).most_recommended_course.is_none());
    }
}
