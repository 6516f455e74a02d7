use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState, AuthUser, OrFail};
use crate::chat::history;
use crate::chat::IncomingMessage;
use crate::db::db_call;
use crate::error::BusyError;
use crate::memory::clamp_limit;

const DEFAULT_LOG_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub(super) struct ChatBody {
    #[serde(default)]
    messages: Option<Vec<IncomingMessage>>,
}

#[derive(Deserialize)]
pub(super) struct LogParams {
    limit: Option<String>,
}

fn messages_required() -> BusyError {
    BusyError::Validation("Messages array is required".into())
}

pub(super) async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|_| messages_required())?;
    let messages = body.messages.ok_or_else(messages_required)?;

    let reply = state
        .chat
        .chat(&user.id, &messages)
        .await
        .or_fail("Failed to process chat request")?;

    Ok(Json(json!({ "message": reply, "success": true })))
}

pub(super) async fn recent_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<LogParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = clamp_limit(
        params
            .limit
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(DEFAULT_LOG_LIMIT),
    );
    let uid = user.id.clone();
    let messages = db_call(&state.db, move |conn| {
        history::recent_messages(conn, &uid, limit)
    })
    .await
    .or_fail("Failed to load messages")?;

    Ok(Json(json!({
        "success": true,
        "messages": messages,
        "count": messages.len(),
    })))
}
