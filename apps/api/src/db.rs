use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::errors::AppError;
use crate::models::question::{
    DeleteOutcome, NewOption, NewQuestion, Question, QuestionOption, QuestionOptionRow,
    QuestionRow, QuestionUpdate,
};
use crate::models::result::{
    NewRecommendation, RecommendationRecord, ResultFilter, SubmittedResponse,
};
use crate::questionnaire::repository::{duplicate_text, options_locked, Repository};

/// Creates a PostgreSQL connection pool and applies pending migrations.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// `Repository` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn options_for(&self, question_ids: &[i64]) -> Result<Vec<QuestionOptionRow>, AppError> {
        Ok(sqlx::query_as::<_, QuestionOptionRow>(
            r#"
            SELECT id, question_id, text, value, display_order, weights
            FROM question_options
            WHERE question_id = ANY($1)
            ORDER BY display_order, id
            "#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Inserts the question and its options in one transaction. Returns `None`
    /// without writing anything when the text is already taken.
    async fn insert_question(&self, question: &NewQuestion) -> Result<Option<i64>, AppError> {
        let mut tx = self.pool.begin().await?;
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO questions (text, question_type, category, display_order, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (text) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&question.text)
        .bind(question.question_type.as_str())
        .bind(&question.category)
        .bind(question.order)
        .bind(question.is_active)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(id) = id else {
            return Ok(None);
        };
        insert_options(&mut tx, id, &question.options).await?;
        tx.commit().await?;

        info!("Created question {id} with {} options", question.options.len());
        Ok(Some(id))
    }

    async fn assemble(&self, rows: Vec<QuestionRow>) -> Result<Vec<Question>, AppError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut grouped: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
        for option in self.options_for(&ids).await? {
            grouped
                .entry(option.question_id)
                .or_default()
                .push(option.into());
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let options = grouped.remove(&row.id).unwrap_or_default();
                row.into_question(options)
            })
            .collect())
    }
}

fn unique_text_error(e: sqlx::Error, text: Option<&str>) -> AppError {
    let duplicate = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    match text {
        Some(text) if duplicate => duplicate_text(text),
        _ => AppError::Database(e),
    }
}

async fn insert_options(
    tx: &mut Transaction<'_, Postgres>,
    question_id: i64,
    options: &[NewOption],
) -> Result<(), AppError> {
    for option in options {
        sqlx::query(
            r#"
            INSERT INTO question_options (question_id, text, value, display_order, weights)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(question_id)
        .bind(&option.text)
        .bind(&option.value)
        .bind(option.order)
        .bind(Json(&option.weights))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl Repository for PgRepository {
    async fn list_questions(&self, active_only: bool) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, text, question_type, category, display_order, is_active, created_at
            FROM questions
            WHERE is_active OR NOT $1
            ORDER BY display_order, id
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, text, question_type, category, display_order, is_active, created_at
            FROM questions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_question(&self, question: NewQuestion) -> Result<Question, AppError> {
        let id = self
            .insert_question(&question)
            .await?
            .ok_or_else(|| duplicate_text(&question.text))?;
        self.get_question(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {id} not found")))
    }

    async fn create_question_if_absent(
        &self,
        question: NewQuestion,
    ) -> Result<Option<Question>, AppError> {
        match self.insert_question(&question).await? {
            Some(id) => self.get_question(id).await,
            None => Ok(None),
        }
    }

    async fn update_question(
        &self,
        id: i64,
        update: QuestionUpdate,
    ) -> Result<Option<Question>, AppError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE questions SET
                text = COALESCE($2, text),
                question_type = COALESCE($3, question_type),
                category = COALESCE($4, category),
                display_order = COALESCE($5, display_order),
                is_active = COALESCE($6, is_active)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.text.as_deref())
        .bind(update.question_type.map(|t| t.as_str()))
        .bind(update.category.as_deref())
        .bind(update.order)
        .bind(update.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_text_error(e, update.text.as_deref()))?
        .rows_affected();
        if updated == 0 {
            return Ok(None);
        }

        if let Some(options) = &update.options {
            let responses: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM questionnaire_responses WHERE question_id = $1",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if responses > 0 {
                return Err(options_locked(id, responses));
            }

            sqlx::query("DELETE FROM question_options WHERE question_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_options(&mut tx, id, options).await?;
        }
        tx.commit().await?;

        self.get_question(id).await
    }

    async fn delete_question(&self, id: i64) -> Result<Option<DeleteOutcome>, AppError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let responses: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM questionnaire_responses WHERE question_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if responses > 0 {
            sqlx::query("UPDATE questions SET is_active = FALSE WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            info!("Deactivated question {id} ({responses} responses attached)");
            return Ok(Some(DeleteOutcome::Deactivated { responses }));
        }

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!("Deleted question {id}");
        Ok(Some(DeleteOutcome::Deleted))
    }

    async fn save_submission(
        &self,
        responses: &[SubmittedResponse],
        result: NewRecommendation,
    ) -> Result<RecommendationRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        for response in responses {
            sqlx::query(
                r#"
                INSERT INTO questionnaire_responses
                    (session_id, question_id, selected_option_id, response_time_ms)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&result.session_id)
            .bind(response.question_id)
            .bind(response.selected_option_id)
            .bind(response.response_time_ms)
            .execute(&mut *tx)
            .await?;
        }

        let record = sqlx::query_as::<_, RecommendationRecord>(
            r#"
            INSERT INTO recommendation_results
                (session_id, scores, recommended_course_key, recommended_course,
                 confidence_score, model_version, processing_time_ms)
            VALUES ($1, $2::json, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&result.session_id)
        // Bound as text so the JSON column keeps the catalog key order.
        .bind(serde_json::to_string(&result.scores).map_err(anyhow::Error::from)?)
        .bind(&result.recommended_course_key)
        .bind(&result.recommended_course)
        .bind(result.confidence_score)
        .bind(&result.model_version)
        .bind(result.processing_time_ms)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn latest_result(
        &self,
        session_id: &str,
    ) -> Result<Option<RecommendationRecord>, AppError> {
        Ok(sqlx::query_as::<_, RecommendationRecord>(
            r#"
            SELECT * FROM recommendation_results
            WHERE session_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_results(
        &self,
        filter: &ResultFilter,
    ) -> Result<Vec<RecommendationRecord>, AppError> {
        Ok(sqlx::query_as::<_, RecommendationRecord>(
            r#"
            SELECT * FROM recommendation_results
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
              AND ($3::text IS NULL OR recommended_course_key = $3 OR recommended_course = $3)
            ORDER BY created_at, id
            "#,
        )
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.course.as_deref())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_responses(&self, since: Option<DateTime<Utc>>) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM questionnaire_responses
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?)
    }
}
