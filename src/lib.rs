//! busy: a chat assistant that remembers.
//!
//! Users keep free-text memories that are embedded through an
//! OpenAI-compatible API and stored in SQLite next to a
//! [sqlite-vec](https://github.com/asg017/sqlite-vec) vector index. Chat
//! requests go to an LLM that can store and recall those memories through
//! tool calls.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (`rusqlite`, bundled) with a `vec0` table partitioned
//!   by user; similarity is `1 - cosine distance`
//! - **Embeddings**: remote, OpenAI or Azure OpenAI
//! - **Chat**: plain completion, a bounded tool loop, or an explicit
//!   agent/tools state graph
//! - **Transport**: an axum HTTP API with cookie sessions, plus a line-JSON
//!   tool server on stdio that proxies the memory endpoints
//!
//! # Modules
//!
//! - [`config`]: TOML config with environment overrides
//! - [`db`]: database initialization, schema, migrations, and health checks
//! - [`embedding`]: the embedding provider trait and HTTP client
//! - [`memory`]: validation, storage, KNN retrieval, and the async service
//! - [`auth`]: users, password hashes, sessions
//! - [`chat`]: LLM client, agent tools, tool loops, message log
//! - [`api`]: HTTP routes
//! - [`tools`]: the stdio tool server

pub mod api;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod server;
pub mod tools;
