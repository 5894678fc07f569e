// src/models/test_paper.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::{Validate, ValidationError};

use crate::models::question::{BloomLevel, Difficulty, Question};
use crate::models::scope::ScopeFilter;

/// Represents the 'tests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestPaper {
    pub id: i64,
    pub name: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,

    /// Whether students can take the test online.
    pub is_online: bool,

    /// Ordered question references.
    pub question_ids: Json<Vec<i64>>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TestPaper {
    /// True when the test is online and `now` falls inside its schedule window.
    pub fn accepts_submissions(&self, now: DateTime<Utc>) -> bool {
        self.is_online
            && self.starts_at.is_none_or(|start| now >= start)
            && self.ends_at.is_none_or(|end| now <= end)
    }
}

pub const TEST_COLUMNS: &str =
    "id, name, starts_at, ends_at, is_online, question_ids, created_at, updated_at";

/// A test together with its questions resolved in list order.
#[derive(Debug, Serialize)]
pub struct TestPaperDetail {
    #[serde(flatten)]
    pub test: TestPaper,
    pub questions: Vec<Question>,
    /// References whose question no longer exists.
    pub missing_question_ids: Vec<i64>,
}

/// DTO for creating a test, or updating its metadata.
#[derive(Debug, Deserialize, Validate)]
pub struct TestPaperRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Name length must be between 1 and 200 characters."
    ))]
    pub name: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_online: bool,
}

impl TestPaperRequest {
    pub fn check_window(&self) -> Result<(), ValidationError> {
        validate_window(self.starts_at, self.ends_at)
    }
}

fn validate_window(
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (starts_at, ends_at) {
        (Some(start), Some(end)) if start >= end => {
            Err(ValidationError::new("window_start_must_precede_end"))
        }
        _ => Ok(()),
    }
}

/// DTO listing question references to add to or remove from a test.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRefsRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "question_ids must contain 1..200 items"
    ))]
    pub question_ids: Vec<i64>,
}

/// Query parameters for replacing one question with a random alternate.
#[derive(Debug, Default, Deserialize)]
pub struct ReplaceQuestionRequest {
    pub seed: Option<u64>,
}

/// DTO for a quota-driven random selection.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub scope: ScopeFilter,
    #[serde(default)]
    pub by_difficulty: std::collections::BTreeMap<Difficulty, usize>,
    #[serde(default)]
    pub by_bloom: std::collections::BTreeMap<BloomLevel, usize>,
    pub total: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}
