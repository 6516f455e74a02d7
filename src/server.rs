//! HTTP server startup.
//!
//! [`build_state`] wires the database, embedding provider, memory service and
//! chat model into an [`AppState`]; [`serve_http`] binds and runs the router
//! until ctrl-c.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};

use crate::api::{self, AppState};
use crate::chat::llm::{ChatModel, OpenAiChat};
use crate::chat::ChatService;
use crate::config::BusyConfig;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::memory::service::MemoryService;

/// Assemble shared state from externally built providers.
pub fn state_from_parts(
    conn: rusqlite::Connection,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn ChatModel>,
    config: &BusyConfig,
) -> AppState {
    let db: db::SharedDb = Arc::new(Mutex::new(conn));
    let memory = MemoryService::new(Arc::clone(&db), embedder);
    let chat = ChatService::new(model, memory.clone(), &config.chat);
    AppState {
        db,
        memory,
        chat,
        auth: config.auth.clone(),
    }
}

/// Open the database, check the recorded embedding model, and create the
/// providers. Each provider is created once and shared.
pub fn build_state(config: &BusyConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path, config.embedding.dimensions)?;
    tracing::info!(db = %db_path.display(), "database ready");

    match db::migrations::get_embedding_model(&conn)? {
        Some(stored) if stored != config.embedding.model => {
            tracing::warn!(
                stored = %stored,
                configured = %config.embedding.model,
                "embedding model changed; existing vectors were produced by a different model"
            );
        }
        Some(_) => {}
        None => db::migrations::set_embedding_model(&conn, &config.embedding.model)?,
    }

    let embedder = embedding::create_provider(&config.embedding)?;
    tracing::info!(model = %embedder.model(), dims = embedder.dimensions(), "embedding provider ready");

    if config.chat.api_key.is_empty() {
        tracing::warn!("chat.api_key is empty; chat requests will be sent unauthenticated");
    }
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiChat::new(&config.chat)?);
    tracing::info!(model = %config.chat.model, mode = ?config.chat.mode, "chat model ready");

    Ok(state_from_parts(conn, embedder, model, config))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

pub async fn serve_http(config: BusyConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(&config)?;
    let router = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "busy HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server shut down");
    Ok(())
}
