// src/handlers/questions.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{
    PgConnection, PgPool, Postgres, QueryBuilder, postgres::PgArguments, query::QueryAs,
    types::Json as SqlJson,
};
use validator::Validate;

use crate::{
    config::MAX_POOL_SIZE,
    error::AppError,
    models::{
        pagination::PaginatedResponse,
        question::{
            BloomLevel, CreateQuestionRequest, Difficulty, QUESTION_COLUMNS, Question,
            QuestionListParams,
        },
        scope::ScopeFilter,
        test_paper::SelectionRequest,
    },
    services::selection::{SelectionQuota, rng_for, select_questions},
};

/// How a candidate pool is read from the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolSampling {
    /// Every matching question, in id order.
    Complete,
    /// More questions match than `MAX_POOL_SIZE`; a uniform random subset of
    /// that size is read instead of the oldest rows.
    Random,
}

impl PoolSampling {
    pub(crate) fn for_matching(matching: i64) -> Self {
        if matching > MAX_POOL_SIZE {
            PoolSampling::Random
        } else {
            PoolSampling::Complete
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            PoolSampling::Complete => " ORDER BY id",
            PoolSampling::Random => " ORDER BY random()",
        }
    }
}

/// Appends the scope and difficulty conditions. Only the most specific level
/// of `scope` is applied; an empty scope means the whole bank.
fn push_pool_filters(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    scope: &ScopeFilter,
    difficulty: Option<Difficulty>,
) {
    if let Some((level, id)) = scope.most_specific() {
        query_builder
            .push(format!(" AND {} = ", level.question_column()))
            .push_bind(id);
    }
    if let Some(difficulty) = difficulty {
        query_builder.push(" AND difficulty = ").push_bind(difficulty);
    }
}

fn push_bloom_filter(query_builder: &mut QueryBuilder<'_, Postgres>, level: BloomLevel) {
    let (matching, shadowing) = level.like_patterns();
    query_builder.push(" AND (");
    for (i, pattern) in matching.into_iter().enumerate() {
        if i > 0 {
            query_builder.push(" OR ");
        }
        query_builder.push("bloom_level ILIKE ").push_bind(pattern);
    }
    query_builder.push(")");
    for pattern in shadowing {
        query_builder
            .push(" AND bloom_level NOT ILIKE ")
            .push_bind(pattern);
    }
}

/// Loads the candidate pool for a scope over `conn`, which may be a
/// transaction already holding locks.
///
/// Every matching question is returned unless more than `MAX_POOL_SIZE` match,
/// in which case a random sample of that size is drawn.
pub(crate) async fn fetch_pool(
    conn: &mut PgConnection,
    scope: &ScopeFilter,
    difficulty: Option<Difficulty>,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut count_query =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM questions WHERE TRUE");
    push_pool_filters(&mut count_query, scope, difficulty);
    let matching: i64 = count_query
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await?;

    let sampling = PoolSampling::for_matching(matching);
    if sampling == PoolSampling::Random {
        tracing::warn!(
            matching,
            cap = MAX_POOL_SIZE,
            "Question pool larger than cap, sampling at random"
        );
    }

    let mut query_builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM questions WHERE TRUE",
        QUESTION_COLUMNS
    ));
    push_pool_filters(&mut query_builder, scope, difficulty);
    query_builder
        .push(sampling.order_by())
        .push(" LIMIT ")
        .push_bind(MAX_POOL_SIZE);

    query_builder
        .build_query_as::<Question>()
        .fetch_all(&mut *conn)
        .await
}

/// Loads the questions with the given ids, in no particular order.
pub(crate) async fn fetch_by_ids(
    executor: impl sqlx::PgExecutor<'_>,
    ids: &[i64],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions WHERE id = ANY($1)",
        QUESTION_COLUMNS
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
}

fn bind_fields<'q>(
    query: QueryAs<'q, Postgres, Question, PgArguments>,
    req: &'q CreateQuestionRequest,
) -> QueryAs<'q, Postgres, Question, PgArguments> {
    query
        .bind(&req.text)
        .bind(SqlJson(&req.options))
        .bind(&req.correct_option)
        .bind(&req.explanation)
        .bind(&req.solution)
        .bind(req.difficulty)
        .bind(&req.bloom_level)
        .bind(req.class_id)
        .bind(req.subject_id)
        .bind(req.chapter_id)
        .bind(req.lesson_id)
        .bind(&req.topic)
        .bind(SqlJson(&req.prerequisites))
        .bind(SqlJson(&req.learning_objectives))
}

fn prepare(payload: CreateQuestionRequest) -> Result<CreateQuestionRequest, AppError> {
    payload.validate()?;
    let payload = payload.sanitized();
    payload.check_answer_key().map_err(AppError::BadRequest)?;
    Ok(payload)
}

/// Lists one page of questions in the most specific scope given, optionally
/// by difficulty and (loosely matched) Bloom level.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let scope = params.scope();
    let (skip, limit) = params.page();

    let mut count_query =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM questions WHERE TRUE");
    push_pool_filters(&mut count_query, &scope, params.difficulty);
    if let Some(level) = params.bloom {
        push_bloom_filter(&mut count_query, level);
    }
    let total_count: i64 = count_query.build_query_scalar().fetch_one(&pool).await?;

    let mut query_builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM questions WHERE TRUE",
        QUESTION_COLUMNS
    ));
    push_pool_filters(&mut query_builder, &scope, params.difficulty);
    if let Some(level) = params.bloom {
        push_bloom_filter(&mut query_builder, level);
    }
    query_builder
        .push(" ORDER BY id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(skip);

    let items = query_builder
        .build_query_as::<Question>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(PaginatedResponse {
        items,
        total_count,
        skip,
        limit,
    }))
}

pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = prepare(payload)?;

    let sql = format!(
        r#"
        INSERT INTO questions
        (text, options, correct_option, explanation, solution, difficulty, bloom_level,
         class_id, subject_id, chapter_id, lesson_id, topic, prerequisites, learning_objectives)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {}
        "#,
        QUESTION_COLUMNS
    );
    let question = bind_fields(sqlx::query_as::<_, Question>(&sql), &payload)
        .fetch_one(&pool)
        .await?;

    tracing::info!(question_id = question.id, "Question created");
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn get_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions WHERE id = $1",
        QUESTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question))
}

/// Replaces every editable field of a question.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = prepare(payload)?;

    let sql = format!(
        r#"
        UPDATE questions SET
            text = $1, options = $2, correct_option = $3, explanation = $4, solution = $5,
            difficulty = $6, bloom_level = $7, class_id = $8, subject_id = $9,
            chapter_id = $10, lesson_id = $11, topic = $12, prerequisites = $13,
            learning_objectives = $14
        WHERE id = $15
        RETURNING {}
        "#,
        QUESTION_COLUMNS
    );
    let question = bind_fields(sqlx::query_as::<_, Question>(&sql), &payload)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question))
}

/// Deletes a question. Tests still listing it report it as missing.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Draws a random selection without saving it anywhere.
pub async fn select_preview(
    State(pool): State<PgPool>,
    Json(payload): Json<SelectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quota = SelectionQuota::from(&payload);
    quota.validate()?;

    let mut conn = pool.acquire().await?;
    let candidates = fetch_pool(&mut conn, &payload.scope, None).await?;
    let selected = select_questions(&candidates, &quota, &mut rng_for(payload.seed));

    if selected.len() < quota.total {
        tracing::warn!(
            requested = quota.total,
            selected = selected.len(),
            "Question pool smaller than requested total"
        );
    }

    Ok(Json(selected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_up_to_the_cap_are_read_whole() {
        assert_eq!(PoolSampling::for_matching(0), PoolSampling::Complete);
        assert_eq!(PoolSampling::for_matching(MAX_POOL_SIZE), PoolSampling::Complete);
    }

    #[test]
    fn pools_over_the_cap_are_sampled_at_random() {
        let sampling = PoolSampling::for_matching(MAX_POOL_SIZE + 1000);
        assert_eq!(sampling, PoolSampling::Random);
        assert_eq!(sampling.order_by(), " ORDER BY random()");
    }

    #[test]
    fn pool_query_applies_only_the_deepest_scope() {
        let scope = ScopeFilter {
            class_id: Some(1),
            subject_id: Some(2),
            chapter_id: Some(3),
            lesson_id: None,
        };
        let mut query_builder =
            QueryBuilder::<Postgres>::new("SELECT id FROM questions WHERE TRUE");
        push_pool_filters(&mut query_builder, &scope, Some(Difficulty::Hard));
        assert_eq!(
            query_builder.sql(),
            "SELECT id FROM questions WHERE TRUE AND chapter_id = $1 AND difficulty = $2"
        );
    }

    #[test]
    fn bloom_filter_excludes_earlier_levels() {
        let mut query_builder =
            QueryBuilder::<Postgres>::new("SELECT id FROM questions WHERE TRUE");
        push_bloom_filter(&mut query_builder, BloomLevel::Understand);
        assert_eq!(
            query_builder.sql(),
            "SELECT id FROM questions WHERE TRUE \
             AND (bloom_level ILIKE $1 OR bloom_level ILIKE $2) \
             AND bloom_level NOT ILIKE $3 AND bloom_level NOT ILIKE $4 \
             AND bloom_level NOT ILIKE $5 AND bloom_level NOT ILIKE $6"
        );
    }
}
