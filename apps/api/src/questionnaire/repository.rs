//! Persistence seam for questions, responses and recommendation results.
//!
//! `AppState` holds an `Arc<dyn Repository>`: `PgRepository` when a database is
//! configured, `MemoryRepository` otherwise (and in tests).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::question::{
    DeleteOutcome, NewOption, NewQuestion, Question, QuestionOption, QuestionUpdate,
};
use crate::models::result::{
    NewRecommendation, RecommendationRecord, ResultFilter, SubmittedResponse,
};

#[async_trait]
pub trait Repository: Send + Sync {
    /// Questions ordered by `order`, then id.
    async fn list_questions(&self, active_only: bool) -> Result<Vec<Question>, AppError>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    /// Question texts are unique; a duplicate is a validation error.
    async fn create_question(&self, question: NewQuestion) -> Result<Question, AppError>;

    /// Atomic check-and-insert keyed on the question text. `None` when a question
    /// with that text already exists.
    async fn create_question_if_absent(
        &self,
        question: NewQuestion,
    ) -> Result<Option<Question>, AppError>;

    async fn update_question(
        &self,
        id: i64,
        update: QuestionUpdate,
    ) -> Result<Option<Question>, AppError>;

    /// Deletes an unanswered question; answered ones are deactivated instead.
    async fn delete_question(&self, id: i64) -> Result<Option<DeleteOutcome>, AppError>;

    /// Stores the answers and the scored result of one submission atomically.
    async fn save_submission(
        &self,
        responses: &[SubmittedResponse],
        result: NewRecommendation,
    ) -> Result<RecommendationRecord, AppError>;

    /// Most recent result stored for a session.
    async fn latest_result(&self, session_id: &str)
        -> Result<Option<RecommendationRecord>, AppError>;

    /// Results matching `filter`, oldest first.
    async fn list_results(&self, filter: &ResultFilter)
        -> Result<Vec<RecommendationRecord>, AppError>;

    /// Stored answers, optionally only those created at or after `since`.
    async fn count_responses(&self, since: Option<DateTime<Utc>>) -> Result<i64, AppError>;
}

pub fn duplicate_text(text: &str) -> AppError {
    AppError::Validation(format!("A question with text '{text}' already exists"))
}

/// Stored responses reference option ids, so an answered question keeps its options.
pub fn options_locked(question_id: i64, responses: i64) -> AppError {
    AppError::Validation(format!(
        "Question {question_id} has {responses} stored responses; its options cannot be replaced"
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory implementation
// ────────────────────────────────────────────────────────────────────────────

struct StoredResponse {
    question_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    questions: BTreeMap<i64, Question>,
    responses: Vec<StoredResponse>,
    results: Vec<RecommendationRecord>,
}

impl MemoryInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_text(&self, text: &str, except: Option<i64>) -> bool {
        self.questions
            .values()
            .any(|q| q.text == text && Some(q.id) != except)
    }

    fn insert_question(&mut self, question: NewQuestion) -> Question {
        let id = self.next_id();
        let options = self.build_options(id, question.options);
        let created = Question {
            id,
            text: question.text,
            question_type: question.question_type,
            category: question.category,
            order: question.order,
            is_active: question.is_active,
            created_at: Utc::now(),
            options,
        };
        self.questions.insert(id, created.clone());
        created
    }

    fn answered(&self, question_id: i64) -> i64 {
        self.responses
            .iter()
            .filter(|r| r.question_id == question_id)
            .count() as i64
    }

    fn build_options(&mut self, question_id: i64, options: Vec<NewOption>) -> Vec<QuestionOption> {
        let mut built: Vec<QuestionOption> = options
            .into_iter()
            .map(|o| QuestionOption {
                id: self.next_id(),
                question_id,
                text: o.text,
                value: o.value,
                order: o.order,
                weights: o.weights,
            })
            .collect();
        built.sort_by_key(|o| (o.order, o.id));
        built
    }
}

/// Process-local store guarded by a tokio `RwLock`. Data is lost on restart.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<MemoryInner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_questions(&self, active_only: bool) -> Result<Vec<Question>, AppError> {
        let inner = self.inner.read().await;
        let mut questions: Vec<Question> = inner
            .questions
            .values()
            .filter(|q| !active_only || q.is_active)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order, q.id));
        Ok(questions)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.inner.read().await.questions.get(&id).cloned())
    }

    async fn create_question(&self, question: NewQuestion) -> Result<Question, AppError> {
        let mut inner = self.inner.write().await;
        if inner.has_text(&question.text, None) {
            return Err(duplicate_text(&question.text));
        }
        Ok(inner.insert_question(question))
    }

    async fn create_question_if_absent(
        &self,
        question: NewQuestion,
    ) -> Result<Option<Question>, AppError> {
        let mut inner = self.inner.write().await;
        if inner.has_text(&question.text, None) {
            return Ok(None);
        }
        Ok(Some(inner.insert_question(question)))
    }

    async fn update_question(
        &self,
        id: i64,
        update: QuestionUpdate,
    ) -> Result<Option<Question>, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.questions.contains_key(&id) {
            return Ok(None);
        }
        if let Some(text) = &update.text {
            if inner.has_text(text, Some(id)) {
                return Err(duplicate_text(text));
            }
        }
        if update.options.is_some() {
            let answered = inner.answered(id);
            if answered > 0 {
                return Err(options_locked(id, answered));
            }
        }
        let Some(mut question) = inner.questions.remove(&id) else {
            return Ok(None);
        };
        if let Some(text) = update.text {
            question.text = text;
        }
        if let Some(question_type) = update.question_type {
            question.question_type = question_type;
        }
        if let Some(category) = update.category {
            question.category = category;
        }
        if let Some(order) = update.order {
            question.order = order;
        }
        if let Some(is_active) = update.is_active {
            question.is_active = is_active;
        }
        if let Some(options) = update.options {
            question.options = inner.build_options(id, options);
        }
        inner.questions.insert(id, question.clone());
        Ok(Some(question))
    }

    async fn delete_question(&self, id: i64) -> Result<Option<DeleteOutcome>, AppError> {
        let mut inner = self.inner.write().await;
        let answered = inner.answered(id);
        let Some(question) = inner.questions.get_mut(&id) else {
            return Ok(None);
        };
        if answered > 0 {
            question.is_active = false;
            return Ok(Some(DeleteOutcome::Deactivated { responses: answered }));
        }
        inner.questions.remove(&id);
        Ok(Some(DeleteOutcome::Deleted))
    }

    async fn save_submission(
        &self,
        responses: &[SubmittedResponse],
        result: NewRecommendation,
    ) -> Result<RecommendationRecord, AppError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        inner
            .responses
            .extend(responses.iter().map(|r| StoredResponse {
                question_id: r.question_id,
                created_at: now,
            }));
        let record = RecommendationRecord {
            id: inner.next_id(),
            session_id: result.session_id,
            scores: Json(result.scores),
            recommended_course_key: result.recommended_course_key,
            recommended_course: result.recommended_course,
            confidence_score: result.confidence_score,
            model_version: result.model_version,
            processing_time_ms: result.processing_time_ms,
            created_at: now,
        };
        inner.results.push(record.clone());
        Ok(record)
    }

    async fn latest_result(
        &self,
        session_id: &str,
    ) -> Result<Option<RecommendationRecord>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .results
            .iter()
            .rev()
            .find(|r| r.session_id == session_id)
            .cloned())
    }

    async fn list_results(
        &self,
        filter: &ResultFilter,
    ) -> Result<Vec<RecommendationRecord>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .results
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn count_responses(&self, since: Option<DateTime<Utc>>) -> Result<i64, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .responses
            .iter()
            .filter(|r| since.map_or(true, |s| r.created_at >= s))
            .count() as i64)
    }
}
