// src/handlers/results.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{questions::fetch_by_ids, test_papers::load_test},
    models::{
        question::Question,
        result::{RESULT_COLUMNS, ResultSummary, SubmitResultRequest, TestResult},
    },
    services::analysis::{performance_report, score_attempt},
    utils::jwt::Claims,
};

async fn load_result(pool: &PgPool, id: i64) -> Result<TestResult, AppError> {
    sqlx::query_as::<_, TestResult>(&format!(
        "SELECT {} FROM test_results WHERE id = $1",
        RESULT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Result not found".to_string()))
}

/// Staff see every result, students only their own.
fn ensure_can_read(claims: &Claims, result: &TestResult) -> Result<(), AppError> {
    if claims.is_staff() || claims.student_id() == Some(result.student_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not your result".to_string()))
    }
}

/// Grades and stores a student's attempt.
///
/// * The token must belong to a student.
/// * The test must be online and inside its schedule window.
/// * One attempt per student and test.
pub async fn submit_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    Json(payload): Json<SubmitResultRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student_id = claims
        .student_id()
        .ok_or(AppError::Forbidden("Only students can submit answers".to_string()))?;

    let now = chrono::Utc::now();
    let test = load_test(&pool, test_id).await?;
    if !test.accepts_submissions(now) {
        return Err(AppError::BadRequest("Test is not accepting submissions".to_string()));
    }
    if test.question_ids.is_empty() {
        return Err(AppError::BadRequest("Test has no questions".to_string()));
    }

    let questions: HashMap<i64, Question> = fetch_by_ids(&pool, &test.question_ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();
    let attempt = score_attempt(&test.question_ids, &payload.answers, &questions, now);

    let result = sqlx::query_as::<_, TestResult>(&format!(
        r#"
        INSERT INTO test_results
        (test_id, student_id, correct, incorrect, skipped, percentage, answers)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        RESULT_COLUMNS
    ))
    .bind(test_id)
    .bind(student_id)
    .bind(attempt.correct)
    .bind(attempt.incorrect)
    .bind(attempt.skipped)
    .bind(attempt.percentage)
    .bind(SqlJson(&attempt.answers))
    .fetch_one(&pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict("Answers for this test were already submitted".to_string())
        }
        other => other,
    })?;

    tracing::info!(
        test_id,
        student_id,
        correct = result.correct,
        percentage = result.percentage,
        "Result submitted"
    );
    Ok((StatusCode::CREATED, Json(result)))
}

/// Lists every result of one test, best first.
pub async fn list_results(
    State(pool): State<PgPool>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    load_test(&pool, test_id).await?;

    let results = sqlx::query_as::<_, ResultSummary>(
        r#"
        SELECT
            r.id, r.student_id, s.name AS student_name,
            r.correct, r.incorrect, r.skipped, r.percentage, r.created_at
        FROM test_results r
        LEFT JOIN students s ON s.id = r.student_id
        WHERE r.test_id = $1
        ORDER BY r.percentage DESC, r.created_at
        "#,
    )
    .bind(test_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list results: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(results))
}

pub async fn get_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = load_result(&pool, id).await?;
    ensure_can_read(&claims, &result)?;
    Ok(Json(result))
}

/// Breaks a result down by difficulty, Bloom level and topic using the
/// current question metadata.
pub async fn get_analysis(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = load_result(&pool, id).await?;
    ensure_can_read(&claims, &result)?;

    let ids: Vec<i64> = result.answers.iter().map(|a| a.question_id).collect();
    let metadata: HashMap<i64, Question> = fetch_by_ids(&pool, &ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();

    if metadata.len() < ids.len() {
        tracing::warn!(result_id = id, "Some answered questions no longer exist");
    }

    Ok(Json(performance_report(&result.answers, &metadata)))
}
