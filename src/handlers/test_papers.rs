// src/handlers/test_papers.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::questions::{fetch_by_ids, fetch_pool},
    models::{
        question::{PublicQuestion, Question},
        scope::ScopeFilter,
        test_paper::{
            QuestionRefsRequest, ReplaceQuestionRequest, SelectionRequest, TEST_COLUMNS,
            TestPaper, TestPaperDetail, TestPaperRequest,
        },
    },
    services::{
        assembly::{merge_question_refs, remove_question_refs, replace_question_ref},
        selection::{SelectionQuota, pick_replacement, rng_for, select_questions},
    },
    utils::jwt::Claims,
};

pub(crate) async fn load_test(pool: &PgPool, id: i64) -> Result<TestPaper, AppError> {
    sqlx::query_as::<_, TestPaper>(&format!("SELECT {} FROM tests WHERE id = $1", TEST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))
}

/// Loads the test row and locks it until the transaction ends, so concurrent
/// edits of the question list are applied one after another.
async fn lock_test(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<TestPaper, AppError> {
    sqlx::query_as::<_, TestPaper>(&format!(
        "SELECT {} FROM tests WHERE id = $1 FOR UPDATE",
        TEST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::NotFound("Test not found".to_string()))
}

async fn save_question_ids(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    question_ids: &[i64],
) -> Result<TestPaper, AppError> {
    let test = sqlx::query_as::<_, TestPaper>(&format!(
        "UPDATE tests SET question_ids = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
        TEST_COLUMNS
    ))
    .bind(SqlJson(question_ids))
    .bind(id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(test)
}

/// Orders `questions` by `question_ids`, collecting ids with no question.
fn resolve_in_order(question_ids: &[i64], questions: Vec<Question>) -> (Vec<Question>, Vec<i64>) {
    let mut by_id: HashMap<i64, Question> = questions.into_iter().map(|q| (q.id, q)).collect();
    let mut ordered = Vec::with_capacity(question_ids.len());
    let mut missing = Vec::new();
    for id in question_ids {
        match by_id.remove(id) {
            Some(q) => ordered.push(q),
            None => missing.push(*id),
        }
    }
    (ordered, missing)
}

pub async fn list_tests(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let tests = sqlx::query_as::<_, TestPaper>(&format!(
        "SELECT {} FROM tests ORDER BY created_at DESC, id DESC",
        TEST_COLUMNS
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list tests: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(tests))
}

pub async fn create_test(
    State(pool): State<PgPool>,
    Json(payload): Json<TestPaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload
        .check_window()
        .map_err(|e| AppError::BadRequest(e.code.to_string()))?;

    let test = sqlx::query_as::<_, TestPaper>(&format!(
        r#"
        INSERT INTO tests (name, starts_at, ends_at, is_online, question_ids)
        VALUES ($1, $2, $3, $4, '[]'::JSONB)
        RETURNING {}
        "#,
        TEST_COLUMNS
    ))
    .bind(payload.name.trim())
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(payload.is_online)
    .fetch_one(&pool)
    .await?;

    tracing::info!(test_id = test.id, "Test created");
    Ok((StatusCode::CREATED, Json(test)))
}

/// Returns the test with its questions in list order.
pub async fn get_test(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = load_test(&pool, id).await?;
    let questions = fetch_by_ids(&pool, &test.question_ids).await?;
    let (questions, missing_question_ids) = resolve_in_order(&test.question_ids, questions);

    if !missing_question_ids.is_empty() {
        tracing::warn!(
            test_id = id,
            missing = ?missing_question_ids,
            "Test references deleted questions"
        );
    }

    Ok(Json(TestPaperDetail {
        test,
        questions,
        missing_question_ids,
    }))
}

/// Updates name, schedule window and online flag. The question list is left alone.
pub async fn update_test(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<TestPaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload
        .check_window()
        .map_err(|e| AppError::BadRequest(e.code.to_string()))?;

    let test = sqlx::query_as::<_, TestPaper>(&format!(
        r#"
        UPDATE tests
        SET name = $1, starts_at = $2, ends_at = $3, is_online = $4, updated_at = NOW()
        WHERE id = $5
        RETURNING {}
        "#,
        TEST_COLUMNS
    ))
    .bind(payload.name.trim())
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(payload.is_online)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Test not found".to_string()))?;

    Ok(Json(test))
}

pub async fn delete_test(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM tests WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Appends questions to a test, skipping ones already on it.
pub async fn add_questions(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionRefsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let known: HashSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT id FROM questions WHERE id = ANY($1)")
            .bind(&payload.question_ids)
            .fetch_all(&pool)
            .await?
            .into_iter()
            .collect();
    let unknown: Vec<i64> = payload
        .question_ids
        .iter()
        .copied()
        .filter(|qid| !known.contains(qid))
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::BadRequest(format!("Unknown question ids: {:?}", unknown)));
    }

    let mut tx = pool.begin().await?;
    let test = lock_test(&mut tx, id).await?;
    let merged = merge_question_refs(&test.question_ids, &payload.question_ids);
    let added = merged.len() - test.question_ids.len();
    let test = save_question_ids(&mut tx, id, &merged).await?;
    tx.commit().await?;

    tracing::info!(test_id = id, added, "Questions added to test");
    Ok(Json(test))
}

pub async fn remove_questions(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionRefsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let to_remove: HashSet<i64> = payload.question_ids.iter().copied().collect();

    let mut tx = pool.begin().await?;
    let test = lock_test(&mut tx, id).await?;
    let remaining = remove_question_refs(&test.question_ids, &to_remove);
    let test = save_question_ids(&mut tx, id, &remaining).await?;
    tx.commit().await?;

    Ok(Json(test))
}

#[derive(Debug, Serialize)]
pub struct ReplaceResponse {
    pub test: TestPaper,
    pub replaced: i64,
    pub replacement: Question,
}

/// Swaps one question for a random one of the same scope and difficulty that
/// is not already on the test.
pub async fn replace_question(
    State(pool): State<PgPool>,
    Path((id, question_id)): Path<(i64, i64)>,
    Query(params): Query<ReplaceQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let test = lock_test(&mut tx, id).await?;
    if !test.question_ids.contains(&question_id) {
        return Err(AppError::NotFound("Question is not part of this test".to_string()));
    }

    // Everything below runs on the locked transaction's connection.
    let current = fetch_by_ids(&mut *tx, &[question_id])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Question not found".to_string()))?;
    let scope = ScopeFilter {
        class_id: current.class_id,
        subject_id: current.subject_id,
        chapter_id: current.chapter_id,
        lesson_id: current.lesson_id,
    };
    let candidates = fetch_pool(&mut tx, &scope, Some(current.difficulty)).await?;

    let exclude: HashSet<i64> = test.question_ids.iter().copied().collect();
    let replacement = pick_replacement(&candidates, &exclude, &mut rng_for(params.seed))
        .ok_or(AppError::NotFound("No alternate question available".to_string()))?;

    let updated = replace_question_ref(&test.question_ids, question_id, replacement.id);
    let test = save_question_ids(&mut tx, id, &updated).await?;
    tx.commit().await?;

    tracing::info!(
        test_id = id,
        replaced = question_id,
        replacement = replacement.id,
        "Question replaced"
    );
    Ok(Json(ReplaceResponse {
        test,
        replaced: question_id,
        replacement,
    }))
}

/// Draws questions by quota from the scope and merges them into the test.
/// Questions already on the test are not drawn again.
pub async fn generate_questions(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<SelectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quota = SelectionQuota::from(&payload);
    quota.validate()?;

    let mut tx = pool.begin().await?;
    let test = lock_test(&mut tx, id).await?;

    let on_test: HashSet<i64> = test.question_ids.iter().copied().collect();
    let mut candidates = fetch_pool(&mut tx, &payload.scope, None).await?;
    candidates.retain(|q| !on_test.contains(&q.id));

    let selected = select_questions(&candidates, &quota, &mut rng_for(payload.seed));
    if selected.len() < quota.total {
        tracing::warn!(
            test_id = id,
            requested = quota.total,
            selected = selected.len(),
            "Question pool smaller than requested total"
        );
    }

    let incoming: Vec<i64> = selected.iter().map(|q| q.id).collect();
    let merged = merge_question_refs(&test.question_ids, &incoming);
    let test = save_question_ids(&mut tx, id, &merged).await?;
    tx.commit().await?;

    Ok(Json(test))
}

/// The student-facing paper: questions without answers, in test order.
///
/// Students only get it while the test accepts submissions.
pub async fn get_paper(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = load_test(&pool, id).await?;
    if !claims.is_staff() && !test.accepts_submissions(chrono::Utc::now()) {
        return Err(AppError::Forbidden("Test is not open".to_string()));
    }

    let questions = fetch_by_ids(&pool, &test.question_ids).await?;
    let (questions, _) = resolve_in_order(&test.question_ids, questions);
    let paper: Vec<PublicQuestion> = questions.into_iter().map(PublicQuestion::from).collect();

    Ok(Json(paper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, sample_question};

    #[test]
    fn resolve_keeps_list_order_and_reports_missing() {
        let questions = vec![
            sample_question(3, Difficulty::Easy, None),
            sample_question(1, Difficulty::Hard, None),
        ];
        let (ordered, missing) = resolve_in_order(&[1, 2, 3], questions);
        let ids: Vec<i64> = ordered.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(missing, vec![2]);
    }
}
