//! Line-delimited JSON tool server.
//!
//! Each stdin line is a request `{"method", "params", "id"?}`; each produces
//! exactly one stdout line. A bad line is answered with `{"error": ...}` and
//! the loop moves on. Logs go to stderr.

pub mod client;
pub mod delete_memory;
pub mod list_memories;
pub mod retrieve_memories;
pub mod store_memory;
pub mod task;
pub mod update_memory;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::BusyConfig;
use client::MemoryApiClient;
use delete_memory::DeleteMemoryParams;
use list_memories::ListMemoriesParams;
use retrieve_memories::RetrieveMemoriesParams;
use store_memory::StoreMemoryParams;
use task::{ExecuteTaskParams, GetStatusParams};
use update_memory::UpdateMemoryParams;

const DEFAULT_TOOL_LIMIT: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid UTF-8")]
    InvalidUtf8,

    #[error("Unknown method")]
    UnknownMethod,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidParams { tool: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from memory API: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// JSON schema of a parameter struct, without the `$schema`/`title` noise.
pub fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_list() -> Vec<ToolInfo> {
    vec![
        ToolInfo {
            name: "get_status",
            description: "Get the current status of the busy assistant",
            input_schema: input_schema::<GetStatusParams>(),
        },
        ToolInfo {
            name: "execute_task",
            description: "Execute a task with the busy assistant",
            input_schema: input_schema::<ExecuteTaskParams>(),
        },
        ToolInfo {
            name: "store_memory",
            description: "Store a memory for the user identified by auth_token. The content is embedded for later semantic search.",
            input_schema: input_schema::<StoreMemoryParams>(),
        },
        ToolInfo {
            name: "retrieve_memories",
            description: "Semantic search over the user's memories, best match first.",
            input_schema: input_schema::<RetrieveMemoriesParams>(),
        },
        ToolInfo {
            name: "list_memories",
            description: "List the user's memories, most recent first.",
            input_schema: input_schema::<ListMemoriesParams>(),
        },
        ToolInfo {
            name: "update_memory",
            description: "Replace the content and metadata of one of the user's memories.",
            input_schema: input_schema::<UpdateMemoryParams>(),
        },
        ToolInfo {
            name: "delete_memory",
            description: "Delete one of the user's memories.",
            input_schema: input_schema::<DeleteMemoryParams>(),
        },
    ]
}

#[derive(Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

pub struct ToolServer {
    api: MemoryApiClient,
}

impl ToolServer {
    pub fn new(api: MemoryApiClient) -> Self {
        Self { api }
    }

    /// Answer one input line. Blank lines produce no output.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (id, outcome) = match serde_json::from_str::<Value>(line) {
            Ok(request) => {
                let id = request.get("id").filter(|v| !v.is_null()).cloned();
                (id, self.dispatch(request).await)
            }
            Err(e) => (None, Err(ToolError::from(e))),
        };

        let mut response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "tool request failed");
                json!({ "error": e.to_string() })
            }
        };
        if let (Some(id), Some(obj)) = (id, response.as_object_mut()) {
            obj.insert("id".into(), id);
        }
        Some(response.to_string())
    }

    async fn dispatch(&self, request: Value) -> Result<Value, ToolError> {
        let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
        match method {
            "tools/list" => Ok(json!({ "tools": tool_list() })),
            "tools/call" => {
                let params = request.get("params").cloned().unwrap_or(Value::Null);
                let call: CallParams = parse_args("tools/call", params)?;
                tracing::info!(tool = %call.name, "tool call");
                let result = self.call_tool(&call.name, call.arguments).await?;
                Ok(json!({ "result": result }))
            }
            _ => Err(ToolError::UnknownMethod),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        match name {
            "get_status" => {
                let _: GetStatusParams = parse_args(name, arguments)?;
                Ok(task::get_status())
            }
            "execute_task" => Ok(task::execute_task(parse_args(name, arguments)?)),
            "store_memory" => {
                let p: StoreMemoryParams = parse_args(name, arguments)?;
                self.api.store(&p.auth_token, &p.content, p.metadata).await
            }
            "retrieve_memories" => {
                let p: RetrieveMemoriesParams = parse_args(name, arguments)?;
                let limit = p.limit.unwrap_or(DEFAULT_TOOL_LIMIT);
                self.api
                    .retrieve(&p.auth_token, &p.query, limit, p.threshold)
                    .await
            }
            "list_memories" => {
                let p: ListMemoriesParams = parse_args(name, arguments)?;
                self.api.list(&p.auth_token, p.limit, p.offset).await
            }
            "update_memory" => {
                let p: UpdateMemoryParams = parse_args(name, arguments)?;
                self.api
                    .update(&p.auth_token, &p.id, &p.content, p.metadata)
                    .await
            }
            "delete_memory" => {
                let p: DeleteMemoryParams = parse_args(name, arguments)?;
                self.api.delete(&p.auth_token, &p.id).await
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Serve until `reader` hits EOF. Only I/O errors end the loop early; a
    /// line that is not UTF-8 gets an error reply like any other bad line.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let response = match std::str::from_utf8(&buf) {
                Ok(line) => self.handle_line(line).await,
                Err(e) => {
                    tracing::warn!(error = %e, "tool request is not valid UTF-8");
                    Some(json!({ "error": ToolError::InvalidUtf8.to_string() }).to_string())
                }
            };
            if let Some(response) = response {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }
}

/// Run the tool server on stdin/stdout.
pub async fn run_stdio(config: &BusyConfig) -> anyhow::Result<()> {
    let api = MemoryApiClient::new(&config.tool_server.api_base_url, &config.auth.cookie_name)?;
    tracing::info!(api = %config.tool_server.api_base_url, "busy tool server running on stdio");

    ToolServer::new(api)
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    tracing::info!("stdin closed, tool server exiting");
    Ok(())
}
