// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// One graded answer inside a test attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub question_id: i64,

    /// Question text at the time of the attempt.
    pub question_text: String,

    /// `None` when the student skipped the question.
    pub answer: Option<String>,

    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Represents the 'test_results' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub test_id: i64,
    pub student_id: i64,
    pub correct: i32,
    pub incorrect: i32,
    pub skipped: i32,
    pub percentage: f64,
    pub answers: Json<Vec<StudentAnswer>>,
    pub created_at: Option<DateTime<Utc>>,
}

pub const RESULT_COLUMNS: &str =
    "id, test_id, student_id, correct, incorrect, skipped, percentage, answers, created_at";

/// A single entry of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    #[serde(default)]
    pub answer: Option<String>,
}

/// DTO for submitting a test attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResultRequest {
    #[validate(length(max = 500, message = "Too many answers submitted."))]
    pub answers: Vec<SubmittedAnswer>,
}

/// Summary row for listing results of a test.
#[derive(Debug, Serialize, FromRow)]
pub struct ResultSummary {
    pub id: i64,
    pub student_id: i64,
    pub student_name: Option<String>,
    pub correct: i32,
    pub incorrect: i32,
    pub skipped: i32,
    pub percentage: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(count: usize) -> SubmitResultRequest {
        SubmitResultRequest {
            answers: (0..count as i64)
                .map(|question_id| SubmittedAnswer {
                    question_id,
                    answer: Some("A".into()),
                })
                .collect(),
        }
    }

    #[test]
    fn submissions_up_to_the_limit_validate() {
        assert!(request(0).validate().is_ok());
        assert!(request(500).validate().is_ok());
    }

    #[test]
    fn oversized_submission_is_rejected() {
        let err = request(501).validate().unwrap_err();
        assert!(err.field_errors().contains_key("answers"));
    }

    #[test]
    fn missing_answer_deserializes_as_skipped() {
        let entry: SubmittedAnswer =
            serde_json::from_value(serde_json::json!({ "question_id": 4 })).unwrap();
        assert_eq!(entry.answer, None);
    }
}
