use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::recommendation::scorer::WeightVector;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Scale,
    Boolean,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Scale => "scale",
            QuestionType::Boolean => "boolean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple_choice" => Some(QuestionType::MultipleChoice),
            "scale" => Some(QuestionType::Scale),
            "boolean" => Some(QuestionType::Boolean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub value: String,
    pub order: i32,
    pub weights: WeightVector,
}

/// A question together with its options, sorted by `order`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub question_type: QuestionType,
    pub category: String,
    pub order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn option(&self, option_id: i64) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOption {
    pub text: String,
    pub value: String,
    pub order: i32,
    #[serde(default)]
    pub weights: WeightVector,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub question_type: QuestionType,
    pub category: String,
    pub order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub options: Vec<NewOption>,
}

/// Partial update. `options`, when present, replaces the whole option list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionUpdate {
    pub text: Option<String>,
    pub question_type: Option<QuestionType>,
    pub category: Option<String>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
    pub options: Option<Vec<NewOption>>,
}

/// Outcome of deleting a question: answered questions are only deactivated.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Deactivated { responses: i64 },
}

// ────────────────────────────────────────────────────────────────────────────
// Database rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub text: String,
    pub question_type: String,
    pub category: String,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct QuestionOptionRow {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub value: String,
    pub display_order: i32,
    pub weights: Json<WeightVector>,
}

impl From<QuestionOptionRow> for QuestionOption {
    fn from(row: QuestionOptionRow) -> Self {
        Self {
            id: row.id,
            question_id: row.question_id,
            text: row.text,
            value: row.value,
            order: row.display_order,
            weights: row.weights.0,
        }
    }
}

impl QuestionRow {
    /// Unknown stored types read as multiple choice, the only type the bank seeds.
    pub fn into_question(self, options: Vec<QuestionOption>) -> Question {
        Question {
            id: self.id,
            question_type: QuestionType::parse(&self.question_type)
                .unwrap_or(QuestionType::MultipleChoice),
            text: self.text,
            category: self.category,
            order: self.display_order,
            is_active: self.is_active,
            created_at: self.created_at,
            options,
        }
    }
}
