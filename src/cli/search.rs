use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};

use crate::auth;
use crate::config::BusyConfig;
use crate::memory::service::MemoryService;

const PREVIEW_CHARS: usize = 120;

/// Run a semantic search over one user's memories from the terminal.
pub async fn search(
    config: &BusyConfig,
    email: &str,
    query: &str,
    limit: i64,
    threshold: f64,
) -> Result<()> {
    let conn = crate::db::open_database(config.resolved_db_path(), config.embedding.dimensions)?;
    let user = auth::find_user_by_email(&conn, email)?
        .with_context(|| format!("no user with email {email}"))?;

    let embedder = crate::embedding::create_provider(&config.embedding)?;
    let service = MemoryService::new(Arc::new(Mutex::new(conn)), embedder);
    let results = service
        .retrieve(&user.id, query, Some(limit), Some(threshold))
        .await?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, result) in results.iter().enumerate() {
        let content = &result.memory.content;
        let preview = if content.chars().count() > PREVIEW_CHARS {
            format!("{}...", content.chars().take(PREVIEW_CHARS).collect::<String>())
        } else {
            content.clone()
        };

        println!(
            "  {}. {} (similarity: {:.1}%)",
            i + 1,
            result.memory.id,
            result.similarity * 100.0,
        );
        println!("     {preview}");
        if !result.memory.metadata.is_empty() {
            println!("     metadata: {}", serde_json::Value::Object(result.memory.metadata.clone()));
        }
        println!();
    }

    Ok(())
}
