//! Write path and direct reads for the memory table.
//!
//! Every function is scoped by owner: a row belonging to another user is
//! indistinguishable from a missing one. Content and embedding are always
//! written in the same transaction so they cannot diverge.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::timestamp_now;
use crate::embedding::validate_embedding;
use crate::error::BusyError;
use crate::memory::embedding_to_bytes;
use crate::memory::types::{Memory, Metadata};

pub(crate) const MEMORY_COLUMNS: &str = "id, user_id, content, metadata, created_at, updated_at";

/// Map a row selected with [`MEMORY_COLUMNS`] (in order) to a [`Memory`].
pub(crate) fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    let metadata_str: String = row.get(3)?;
    let metadata: Metadata = serde_json::from_str(&metadata_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Memory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        metadata,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn metadata_json(metadata: &Metadata) -> Result<String, BusyError> {
    serde_json::to_string(metadata)
        .map_err(|e| BusyError::Internal(format!("metadata serialization failed: {e}")))
}

/// Insert a new memory and its embedding.
pub fn insert_memory(
    conn: &mut Connection,
    user_id: &str,
    content: &str,
    metadata: &Metadata,
    embedding: &[f32],
    dimensions: usize,
) -> Result<Memory, BusyError> {
    validate_embedding(embedding, dimensions)?;

    let id = uuid::Uuid::now_v7().to_string();
    let now = timestamp_now();
    let metadata_str = metadata_json(metadata)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memories (id, user_id, content, metadata, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, user_id, content, metadata_str, now],
    )?;
    insert_vec(&tx, &id, user_id, embedding)?;
    tx.commit()?;

    Ok(Memory {
        id,
        user_id: user_id.to_string(),
        content: content.to_string(),
        metadata: metadata.clone(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Fetch one memory owned by `user_id`.
pub fn get_memory(conn: &Connection, id: &str, user_id: &str) -> Result<Option<Memory>, BusyError> {
    let memory = conn
        .query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
            memory_from_row,
        )
        .optional()?;
    Ok(memory)
}

/// Replace content, metadata, and embedding of a memory owned by `user_id`.
///
/// Returns `None` (and writes nothing) when no such memory exists for this user.
pub fn update_memory(
    conn: &mut Connection,
    id: &str,
    user_id: &str,
    content: &str,
    metadata: &Metadata,
    embedding: &[f32],
    dimensions: usize,
) -> Result<Option<Memory>, BusyError> {
    validate_embedding(embedding, dimensions)?;

    let now = timestamp_now();
    let metadata_str = metadata_json(metadata)?;

    let tx = conn.transaction()?;
    let rows = tx.execute(
        "UPDATE memories SET content = ?1, metadata = ?2, updated_at = ?3 \
         WHERE id = ?4 AND user_id = ?5",
        params![content, metadata_str, now, id, user_id],
    )?;
    if rows == 0 {
        return Ok(None);
    }

    tx.execute("DELETE FROM memories_vec WHERE id = ?1", params![id])?;
    insert_vec(&tx, id, user_id, embedding)?;

    let memory = tx.query_row(
        &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
        params![id],
        memory_from_row,
    )?;
    tx.commit()?;

    Ok(Some(memory))
}

/// Delete a memory owned by `user_id`. Returns `false` if nothing was deleted.
pub fn delete_memory(conn: &mut Connection, id: &str, user_id: &str) -> Result<bool, BusyError> {
    let tx = conn.transaction()?;
    let rows = tx.execute(
        "DELETE FROM memories WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if rows == 0 {
        return Ok(false);
    }
    tx.execute("DELETE FROM memories_vec WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(true)
}

/// Most recent first. `limit` and `offset` are expected pre-clamped.
pub fn list_memories(
    conn: &Connection,
    user_id: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<Memory>, BusyError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMORY_COLUMNS} FROM memories WHERE user_id = ?1 \
         ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
    ))?;
    let memories = stmt
        .query_map(params![user_id, limit as i64, offset as i64], memory_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(memories)
}

/// Insert an embedding vector into the vec0 virtual table.
fn insert_vec(conn: &Connection, id: &str, user_id: &str, embedding: &[f32]) -> Result<(), BusyError> {
    conn.execute(
        "INSERT INTO memories_vec (id, user_id, embedding) VALUES (?1, ?2, ?3)",
        params![id, user_id, embedding_to_bytes(embedding)],
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;

    pub(crate) const DIMS: usize = 8;

    pub(crate) fn test_db() -> Connection {
        let conn = db::open_memory_database(DIMS).unwrap();
        for user in ["alice", "bob"] {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, 'x', ?3)",
                params![user, format!("{user}@example.com"), timestamp_now()],
            )
            .unwrap();
        }
        conn
    }

    /// Unit vector along `axis`.
    pub(crate) fn axis(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        v[axis] = 1.0;
        v
    }

    fn meta(json: serde_json::Value) -> Metadata {
        json.as_object().cloned().unwrap()
    }

    fn vec_rows(conn: &Connection, id: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM memories_vec WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut conn = test_db();
        let metadata = meta(serde_json::json!({"category": "hobby", "tags": ["music"]}));
        let stored = insert_memory(&mut conn, "alice", "User plays guitar", &metadata, &axis(0), DIMS)
            .unwrap();

        let fetched = get_memory(&conn, &stored.id, "alice").unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.metadata["tags"][0], "music");
        assert_eq!(vec_rows(&conn, &stored.id), 1);
    }

    #[test]
    fn get_is_scoped_to_owner() {
        let mut conn = test_db();
        let stored =
            insert_memory(&mut conn, "alice", "secret", &Metadata::new(), &axis(0), DIMS).unwrap();
        assert!(get_memory(&conn, &stored.id, "bob").unwrap().is_none());
    }

    #[test]
    fn non_finite_embedding_is_a_storage_fault_and_writes_nothing() {
        let mut conn = test_db();
        let mut bad = axis(0);
        bad[3] = f32::NAN;
        let err = insert_memory(&mut conn, "alice", "x", &Metadata::new(), &bad, DIMS).unwrap_err();
        assert!(matches!(err, BusyError::StorageFault(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn update_rewrites_content_metadata_and_vector() {
        let mut conn = test_db();
        let stored =
            insert_memory(&mut conn, "alice", "old", &Metadata::new(), &axis(0), DIMS).unwrap();

        let updated = update_memory(
            &mut conn,
            &stored.id,
            "alice",
            "new",
            &meta(serde_json::json!({"v": 2})),
            &axis(1),
            DIMS,
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.content, "new");
        assert_eq!(updated.metadata["v"], 2);
        assert_eq!(updated.created_at, stored.created_at);
        assert!(updated.updated_at >= stored.updated_at);
        assert_eq!(vec_rows(&conn, &stored.id), 1);
    }

    #[test]
    fn update_by_other_user_changes_nothing() {
        let mut conn = test_db();
        let stored =
            insert_memory(&mut conn, "alice", "mine", &Metadata::new(), &axis(0), DIMS).unwrap();

        let result = update_memory(
            &mut conn,
            &stored.id,
            "bob",
            "hijacked",
            &Metadata::new(),
            &axis(1),
            DIMS,
        )
        .unwrap();
        assert!(result.is_none());

        let fetched = get_memory(&conn, &stored.id, "alice").unwrap().unwrap();
        assert_eq!(fetched.content, "mine");
    }

    #[test]
    fn delete_is_scoped_to_owner() {
        let mut conn = test_db();
        let stored =
            insert_memory(&mut conn, "alice", "mine", &Metadata::new(), &axis(0), DIMS).unwrap();

        assert!(!delete_memory(&mut conn, &stored.id, "bob").unwrap());
        assert!(get_memory(&conn, &stored.id, "alice").unwrap().is_some());

        assert!(delete_memory(&mut conn, &stored.id, "alice").unwrap());
        assert!(get_memory(&conn, &stored.id, "alice").unwrap().is_none());
        assert_eq!(vec_rows(&conn, &stored.id), 0);

        // Second delete finds nothing
        assert!(!delete_memory(&mut conn, &stored.id, "alice").unwrap());
    }

    #[test]
    fn list_is_most_recent_first_with_paging() {
        let mut conn = test_db();
        let ids: Vec<String> = (0..5)
            .map(|i| {
                insert_memory(&mut conn, "alice", &format!("m{i}"), &Metadata::new(), &axis(i), DIMS)
                    .unwrap()
                    .id
            })
            .collect();
        insert_memory(&mut conn, "bob", "other", &Metadata::new(), &axis(0), DIMS).unwrap();

        let all = list_memories(&conn, "alice", 10, 0).unwrap();
        let listed: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        let expected: Vec<&str> = ids.iter().rev().map(String::as_str).collect();
        assert_eq!(listed, expected);

        let page = list_memories(&conn, "alice", 2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, ids[3]);
        assert_eq!(page[1].id, ids[2]);

        assert!(list_memories(&conn, "alice", 10, 50).unwrap().is_empty());
    }

    #[test]
    fn corrupt_metadata_is_an_error_not_an_empty_object() {
        let mut conn = test_db();
        let stored =
            insert_memory(&mut conn, "alice", "m", &meta(serde_json::json!({"k": 1})), &axis(0), DIMS)
                .unwrap();
        conn.execute(
            "UPDATE memories SET metadata = '{broken' WHERE id = ?1",
            params![stored.id],
        )
        .unwrap();

        let err = get_memory(&conn, &stored.id, "alice").unwrap_err();
        assert!(matches!(err, BusyError::Database(_)));
        assert!(err.is_internal());
        assert!(list_memories(&conn, "alice", 10, 0).is_err());
    }
}
