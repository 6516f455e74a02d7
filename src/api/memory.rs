//! `/api/memory` handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState, AuthUser, OrFail};
use crate::error::BusyError;
use crate::memory::DEFAULT_THRESHOLD;

const DEFAULT_HTTP_LIMIT: i64 = 10;

#[derive(Deserialize)]
pub(super) struct StoreBody {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Deserialize)]
pub(super) struct UpdateBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

/// Query parameters arrive as raw strings; unparsable values fall back to
/// defaults instead of failing the request.
#[derive(Deserialize)]
pub(super) struct ListParams {
    query: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
    threshold: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct DeleteParams {
    id: Option<String>,
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

pub(super) async fn create_memory(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<StoreBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|_| BusyError::EmptyContent)?;
    let Some(Value::String(content)) = body.content else {
        return Err(BusyError::EmptyContent.into());
    };

    let memory = state
        .memory
        .store(&user.id, &content, body.metadata)
        .await
        .or_fail("Failed to store memory")?;

    Ok(Json(json!({
        "success": true,
        "memory": {
            "id": memory.id,
            "content": memory.content,
            "metadata": memory.metadata,
            "createdAt": memory.created_at,
        },
    })))
}

/// Semantic search when `query` is present, otherwise a recency listing.
pub(super) async fn list_or_search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = parse_or(params.limit.as_deref(), DEFAULT_HTTP_LIMIT);
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();

    let (memories, count) = if query.is_empty() {
        let offset = parse_or(params.offset.as_deref(), 0i64);
        let memories = state
            .memory
            .list(&user.id, Some(limit), Some(offset))
            .await
            .or_fail("Failed to retrieve memories")?;
        let count = memories.len();
        (json!(memories), count)
    } else {
        let threshold = parse_or(params.threshold.as_deref(), DEFAULT_THRESHOLD);
        let results = state
            .memory
            .retrieve(&user.id, query, Some(limit), Some(threshold))
            .await
            .or_fail("Failed to retrieve memories")?;
        let count = results.len();
        (json!(results), count)
    };

    Ok(Json(json!({
        "success": true,
        "memories": memories,
        "count": count,
    })))
}

pub(super) async fn get_memory(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let memory = state
        .memory
        .get(&id, &user.id)
        .await
        .or_fail("Failed to retrieve memory")?
        .ok_or(BusyError::NotFound)?;

    Ok(Json(json!({ "success": true, "memory": memory })))
}

pub(super) async fn update_memory(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let required = || BusyError::Validation("Memory ID and content are required".into());
    let Json(body) = body.map_err(|_| required())?;
    let (Some(id), Some(content)) = (body.id, body.content) else {
        return Err(required().into());
    };
    if id.is_empty() || content.is_empty() {
        return Err(required().into());
    }

    let memory = state
        .memory
        .update(&id, &user.id, &content, body.metadata)
        .await
        .or_fail("Failed to update memory")?
        .ok_or(BusyError::NotFound)?;

    Ok(Json(json!({
        "success": true,
        "memory": {
            "id": memory.id,
            "content": memory.content,
            "metadata": memory.metadata,
            "updatedAt": memory.updated_at,
        },
    })))
}

pub(super) async fn delete_memory(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Value>, ApiError> {
    let id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BusyError::Validation("Memory ID is required".into()))?;

    let deleted = state
        .memory
        .delete(&id, &user.id)
        .await
        .or_fail("Failed to delete memory")?;
    if !deleted {
        return Err(BusyError::NotFound.into());
    }

    Ok(Json(json!({
        "success": true,
        "message": "Memory deleted successfully",
    })))
}
