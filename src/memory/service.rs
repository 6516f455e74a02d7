//! Async façade over the memory store.
//!
//! Order of work for every write: validate input, call the embedding
//! provider, then run the SQLite work on the blocking pool. Nothing invalid
//! ever costs an embedding request.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::db::{db_call, SharedDb};
use crate::embedding::EmbeddingProvider;
use crate::error::BusyError;
use crate::memory::types::{Memory, MemorySearchResult};
use crate::memory::{
    clamp_limit, clamp_offset, clamp_threshold, normalize_metadata, parse_memory_id, search,
    store, validate_content, DEFAULT_THRESHOLD,
};

/// Retrieval size when the caller gives none.
pub const DEFAULT_RETRIEVE_LIMIT: i64 = 5;
/// Page size for `list` when the caller gives none.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct MemoryService {
    db: SharedDb,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MemoryService {
    pub fn new(db: SharedDb, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, embedder }
    }

    pub fn db(&self) -> &SharedDb {
        &self.db
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BusyError> {
        let embedding = self.embedder.embed(text).await?;
        debug!(dims = embedding.len(), "embedding generated");
        Ok(embedding)
    }

    pub async fn store(
        &self,
        user_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Memory, BusyError> {
        validate_content(content)?;
        let metadata = normalize_metadata(metadata)?;
        let embedding = self.embed(content).await?;

        let dims = self.embedder.dimensions();
        let (uid, text) = (user_id.to_string(), content.to_string());
        let memory = db_call(&self.db, move |conn| {
            store::insert_memory(conn, &uid, &text, &metadata, &embedding, dims)
        })
        .await?;

        info!(id = %memory.id, user_id, chars = content.chars().count(), "memory stored");
        Ok(memory)
    }

    /// Semantic search. `limit` and `threshold` are clamped, never rejected.
    pub async fn retrieve(
        &self,
        user_id: &str,
        query: &str,
        limit: Option<i64>,
        threshold: Option<f64>,
    ) -> Result<Vec<MemorySearchResult>, BusyError> {
        if query.trim().is_empty() {
            return Err(BusyError::Validation("Query is required".into()));
        }
        let limit = clamp_limit(limit.unwrap_or(DEFAULT_RETRIEVE_LIMIT));
        let threshold = clamp_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD));
        let embedding = self.embed(query).await?;

        let dims = self.embedder.dimensions();
        let uid = user_id.to_string();
        let results = db_call(&self.db, move |conn| {
            search::retrieve_memories(conn, &uid, &embedding, limit, threshold, dims)
        })
        .await?;

        info!(user_id, limit, threshold, returned = results.len(), "memories retrieved");
        Ok(results)
    }

    pub async fn get(&self, id: &str, user_id: &str) -> Result<Option<Memory>, BusyError> {
        let id = parse_memory_id(id)?;
        let uid = user_id.to_string();
        db_call(&self.db, move |conn| store::get_memory(conn, &id, &uid)).await
    }

    /// Replace content and metadata, regenerating the embedding.
    ///
    /// Returns `None` when the memory does not exist or belongs to someone
    /// else; in that case no embedding request is made.
    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<Memory>, BusyError> {
        let id = parse_memory_id(id)?;
        validate_content(content)?;
        let metadata = normalize_metadata(metadata)?;

        let (check_id, check_uid) = (id.clone(), user_id.to_string());
        let owned = db_call(&self.db, move |conn| {
            store::get_memory(conn, &check_id, &check_uid).map(|m| m.is_some())
        })
        .await?;
        if !owned {
            warn!(id = %id, user_id, "update of missing or foreign memory");
            return Ok(None);
        }

        let embedding = self.embed(content).await?;
        let dims = self.embedder.dimensions();
        let (uid, text) = (user_id.to_string(), content.to_string());
        let updated = db_call(&self.db, move |conn| {
            store::update_memory(conn, &id, &uid, &text, &metadata, &embedding, dims)
        })
        .await?;

        if let Some(memory) = &updated {
            info!(id = %memory.id, user_id, "memory updated");
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool, BusyError> {
        let id = parse_memory_id(id)?;
        let uid = user_id.to_string();
        let log_id = id.clone();
        let deleted = db_call(&self.db, move |conn| store::delete_memory(conn, &id, &uid)).await?;
        if deleted {
            info!(id = %log_id, user_id, "memory deleted");
        } else {
            warn!(id = %log_id, user_id, "delete of missing or foreign memory");
        }
        Ok(deleted)
    }

    /// Most recent first. Out-of-range paging is clamped.
    pub async fn list(
        &self,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Memory>, BusyError> {
        let limit = clamp_limit(limit.unwrap_or(DEFAULT_LIST_LIMIT));
        let offset = clamp_offset(offset.unwrap_or(0));
        let uid = user_id.to_string();
        db_call(&self.db, move |conn| {
            store::list_memories(conn, &uid, limit, offset)
        })
        .await
    }
}
