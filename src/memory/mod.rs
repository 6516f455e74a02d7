pub mod search;
pub mod service;
pub mod store;
pub mod types;

use crate::error::BusyError;
use types::Metadata;

/// Hard cap on memory content, in characters.
pub const MAX_CONTENT_CHARS: usize = 8000;
/// Upper bound for any `limit` accepted from callers.
pub const MAX_LIMIT: i64 = 100;
/// Similarity floor used when the caller does not give one.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// Content must be non-blank and at most [`MAX_CONTENT_CHARS`] characters.
pub fn validate_content(content: &str) -> Result<(), BusyError> {
    if content.trim().is_empty() {
        return Err(BusyError::EmptyContent);
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(BusyError::ContentTooLong);
    }
    Ok(())
}

/// Parse a memory id and return its canonical (lowercase, hyphenated) form.
pub fn parse_memory_id(id: &str) -> Result<String, BusyError> {
    uuid::Uuid::parse_str(id.trim())
        .map(|u| u.to_string())
        .map_err(|_| BusyError::InvalidId(id.to_string()))
}

/// Absent and `null` metadata become `{}`; anything but an object is rejected.
pub fn normalize_metadata(metadata: Option<serde_json::Value>) -> Result<Metadata, BusyError> {
    match metadata {
        None | Some(serde_json::Value::Null) => Ok(Metadata::new()),
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(_) => Err(BusyError::Validation(
            "Metadata must be a JSON object".into(),
        )),
    }
}

pub fn clamp_limit(limit: i64) -> usize {
    limit.clamp(1, MAX_LIMIT) as usize
}

pub fn clamp_offset(offset: i64) -> usize {
    offset.max(0) as usize
}

pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        DEFAULT_THRESHOLD
    } else {
        threshold.clamp(0.0, 1.0)
    }
}
