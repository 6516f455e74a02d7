//! Append-only chat log.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::timestamp_now;
use crate::error::BusyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRole {
    User,
    Assistant,
}

impl LogRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogRole::User => "user",
            LogRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

pub fn append_message(
    conn: &Connection,
    user_id: &str,
    role: LogRole,
    content: &str,
) -> Result<StoredMessage, BusyError> {
    let message = StoredMessage {
        id: uuid::Uuid::now_v7().to_string(),
        role: role.as_str().to_string(),
        content: content.to_string(),
        created_at: timestamp_now(),
    };
    conn.execute(
        "INSERT INTO messages (id, user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![message.id, user_id, message.role, message.content, message.created_at],
    )?;
    Ok(message)
}

/// The last `limit` messages of `user_id`, oldest first.
pub fn recent_messages(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<StoredMessage>, BusyError> {
    let mut stmt = conn.prepare(
        "SELECT id, role, content, created_at FROM messages WHERE user_id = ?1 \
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let mut messages = stmt
        .query_map(params![user_id, limit as i64], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                role: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    messages.reverse();
    Ok(messages)
}
