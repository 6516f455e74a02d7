//! Cosine nearest-neighbour retrieval over the owner's vector partition.

use rusqlite::{params, Connection};

use crate::embedding::validate_embedding;
use crate::error::BusyError;
use crate::memory::embedding_to_bytes;
use crate::memory::store::memory_from_row;
use crate::memory::types::MemorySearchResult;

/// KNN restricted to one `user_id` partition; the distance-to-similarity
/// conversion and the threshold filter happen on the join. Similarity is
/// capped at 1.0 so rounding on identical vectors cannot pass a 1.0 threshold.
const KNN_SQL: &str = "
    WITH knn AS (
        SELECT id, distance
        FROM memories_vec
        WHERE embedding MATCH ?1 AND k = ?2 AND user_id = ?3
    )
    SELECT m.id, m.user_id, m.content, m.metadata, m.created_at, m.updated_at,
           MIN(1.0, 1.0 - knn.distance) AS similarity
    FROM knn
    JOIN memories m ON m.id = knn.id
    WHERE m.user_id = ?3 AND MIN(1.0, 1.0 - knn.distance) > ?4
    ORDER BY knn.distance ASC, m.id ASC
    LIMIT ?2";

/// Return at most `limit` memories of `user_id` whose cosine similarity to
/// `query_embedding` is strictly greater than `threshold`, best first.
///
/// Filtering after the top-`limit` cut gives the same rows as filtering first:
/// similarity is monotone in distance.
pub fn retrieve_memories(
    conn: &Connection,
    user_id: &str,
    query_embedding: &[f32],
    limit: usize,
    threshold: f64,
    dimensions: usize,
) -> Result<Vec<MemorySearchResult>, BusyError> {
    validate_embedding(query_embedding, dimensions)?;

    let mut stmt = conn.prepare(KNN_SQL)?;
    let results = stmt
        .query_map(
            params![
                embedding_to_bytes(query_embedding),
                limit as i64,
                user_id,
                threshold
            ],
            |row| {
                Ok(MemorySearchResult {
                    memory: memory_from_row(row)?,
                    similarity: row.get(6)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(user_id, returned = results.len(), threshold, "knn retrieval");
    Ok(results)
}
