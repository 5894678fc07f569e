// src/handlers/scopes.rs

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
    models::scope::{CreateScopeRequest, ScopeLevel, ScopeListParams, ScopeNode},
};

fn parse_level(segment: &str) -> Result<ScopeLevel, AppError> {
    ScopeLevel::from_path(segment)
        .ok_or_else(|| AppError::NotFound(format!("Unknown scope level '{}'", segment)))
}

/// `SELECT` list shared by every scope table; classes report a NULL parent.
fn scope_columns(level: ScopeLevel) -> String {
    let parent = level.parent_column().unwrap_or("NULL::BIGINT");
    format!("id, name, {} AS parent_id, created_at", parent)
}

/// Lists the nodes of one level, optionally only the children of `parent_id`.
pub async fn list_scopes(
    State(pool): State<PgPool>,
    Path(level): Path<String>,
    Query(params): Query<ScopeListParams>,
) -> Result<impl IntoResponse, AppError> {
    let level = parse_level(&level)?;

    let nodes = match (level.parent_column(), params.parent_id) {
        (Some(parent_column), Some(parent_id)) => {
            sqlx::query_as::<_, ScopeNode>(&format!(
                "SELECT {} FROM {} WHERE {} = $1 ORDER BY name",
                scope_columns(level),
                level.table(),
                parent_column
            ))
            .bind(parent_id)
            .fetch_all(&pool)
            .await?
        }
        _ => {
            sqlx::query_as::<_, ScopeNode>(&format!(
                "SELECT {} FROM {} ORDER BY name",
                scope_columns(level),
                level.table()
            ))
            .fetch_all(&pool)
            .await?
        }
    };

    Ok(Json(nodes))
}

/// Creates a node. Every level below `class` needs an existing parent.
pub async fn create_scope(
    State(pool): State<PgPool>,
    Path(level): Path<String>,
    Json(payload): Json<CreateScopeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let level = parse_level(&level)?;
    payload.validate()?;
    let name = payload.name.trim();

    let node = match (level.parent(), payload.parent_id) {
        (None, None) => {
            sqlx::query_as::<_, ScopeNode>(&format!(
                "INSERT INTO {} (name) VALUES ($1) RETURNING {}",
                level.table(),
                scope_columns(level)
            ))
            .bind(name)
            .fetch_one(&pool)
            .await?
        }
        (None, Some(_)) => {
            return Err(AppError::BadRequest("Classes do not have a parent".to_string()));
        }
        (Some(parent), None) => {
            return Err(AppError::BadRequest(format!(
                "parent_id is required (the {} the node belongs to)",
                parent.question_column().trim_end_matches("_id")
            )));
        }
        (Some(parent), Some(parent_id)) => {
            let exists: Option<i64> =
                sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = $1", parent.table()))
                    .bind(parent_id)
                    .fetch_optional(&pool)
                    .await?;
            if exists.is_none() {
                return Err(AppError::NotFound("Parent not found".to_string()));
            }

            sqlx::query_as::<_, ScopeNode>(&format!(
                "INSERT INTO {} (name, {}) VALUES ($1, $2) RETURNING {}",
                level.table(),
                parent.question_column(),
                scope_columns(level)
            ))
            .bind(name)
            .bind(parent_id)
            .fetch_one(&pool)
            .await?
        }
    };

    tracing::info!(level = level.table(), id = node.id, "Scope node created");
    Ok((StatusCode::CREATED, Json(node)))
}

/// Deletes a node; child nodes go with it, questions keep their other scopes.
pub async fn delete_scope(
    State(pool): State<PgPool>,
    Path((level, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let level = parse_level(&level)?;

    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", level.table()))
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete scope node: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Scope node not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
