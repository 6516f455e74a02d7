//! Core memory type definitions.
//!
//! [`Memory`] mirrors a row of the `memories` table; [`MemorySearchResult`]
//! adds the cosine similarity computed during retrieval.

use serde::{Deserialize, Serialize};

/// Free-form metadata attached to a memory. Always a JSON object.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A memory record, matching the `memories` table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// Owning user. Every read and write is filtered by it.
    pub user_id: String,
    /// The full text content of the memory.
    pub content: String,
    /// Arbitrary JSON object (e.g. `{"category": "work"}`).
    pub metadata: Metadata,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-modification timestamp.
    pub updated_at: String,
}

/// A memory returned from semantic search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySearchResult {
    #[serde(flatten)]
    pub memory: Memory,
    /// Cosine similarity to the query, in `(threshold, 1]`.
    pub similarity: f64,
}
