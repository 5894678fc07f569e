// src/handlers/students.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::student::{
        CreateStudentRequest, PARENT_COLUMNS, Parent, ParentView, STUDENT_COLUMNS, Student,
        StudentListParams, StudentView, UNASSIGNED_CLASS,
    },
};

/// Lists students, optionally only one class's roster.
pub async fn list_students(
    State(pool): State<PgPool>,
    Query(params): Query<StudentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let students = sqlx::query_as::<_, Student>(&format!(
        r#"
        SELECT {} FROM students
        WHERE ($1::BIGINT IS NULL OR class_id = $1)
        ORDER BY name, id
        "#,
        STUDENT_COLUMNS
    ))
    .bind(params.class_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(students))
}

/// Creates a student, and its parent first when given inline.
pub async fn create_student(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if payload.parent.is_some() && payload.parent_id.is_some() {
        return Err(AppError::BadRequest(
            "Give either parent_id or parent, not both".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let parent_id = match &payload.parent {
        Some(parent) => {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO parents (name, email, phone) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(parent.name.trim())
            .bind(&parent.email)
            .bind(&parent.phone)
            .fetch_one(&mut *tx)
            .await?;
            Some(id)
        }
        None => payload.parent_id,
    };

    let student = sqlx::query_as::<_, Student>(&format!(
        r#"
        INSERT INTO students (name, email, class_id, parent_id)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        STUDENT_COLUMNS
    ))
    .bind(payload.name.trim())
    .bind(&payload.email)
    .bind(payload.class_id)
    .bind(parent_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(student_id = student.id, parent_id = ?parent_id, "Student created");
    Ok((StatusCode::CREATED, Json(student)))
}

/// A student with class name and parent. Lookups that fail degrade to
/// placeholders instead of failing the request.
pub async fn get_student(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student = sqlx::query_as::<_, Student>(&format!(
        "SELECT {} FROM students WHERE id = $1",
        STUDENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Student not found".to_string()))?;

    let class_name = match student.class_id {
        Some(class_id) => sqlx::query_scalar::<_, String>("SELECT name FROM classes WHERE id = $1")
            .bind(class_id)
            .fetch_optional(&pool)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to load class {} for student {}: {:?}", class_id, id, e);
                None
            }),
        None => None,
    }
    .unwrap_or_else(|| UNASSIGNED_CLASS.to_string());

    let parent = match student.parent_id {
        Some(parent_id) => sqlx::query_as::<_, Parent>(&format!(
            "SELECT {} FROM parents WHERE id = $1",
            PARENT_COLUMNS
        ))
        .bind(parent_id)
        .fetch_optional(&pool)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load parent {} for student {}: {:?}", parent_id, id, e);
            None
        }),
        None => None,
    };

    Ok(Json(StudentView {
        student,
        class_name,
        parent,
    }))
}

/// Deletes a student. Their results go with them; the parent stays.
pub async fn delete_student(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_parent(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let parent = sqlx::query_as::<_, Parent>(&format!(
        "SELECT {} FROM parents WHERE id = $1",
        PARENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Parent not found".to_string()))?;

    let children = sqlx::query_as::<_, Student>(&format!(
        "SELECT {} FROM students WHERE parent_id = $1 ORDER BY name, id",
        STUDENT_COLUMNS
    ))
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(ParentView { parent, children }))
}
