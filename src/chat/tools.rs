//! Memory tools the chat agent can call, bound to a single user.
//!
//! Tool failures never abort a conversation: every outcome, including an
//! unknown tool or unparsable arguments, becomes the text of the tool result.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::llm::{ToolCall, ToolDefinition};
use crate::memory::service::{MemoryService, DEFAULT_RETRIEVE_LIMIT};
use crate::memory::DEFAULT_THRESHOLD;
use crate::tools::input_schema;

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> ToolDefinition;
    async fn call(&self, arguments: serde_json::Value) -> String;
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StoreMemoryArgs {
    #[schemars(description = "The information to remember, reformulated clearly")]
    pub content: String,

    #[schemars(description = "Optional category like \"personal\", \"work\", \"preferences\", etc.")]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RetrieveMemoriesArgs {
    #[schemars(description = "What to search for in the memories")]
    pub query: String,

    #[schemars(description = "Maximum number of memories to retrieve")]
    pub limit: Option<f64>,
}

const STORE_DESCRIPTION: &str = "Store an important piece of information about the user for future reference. \
Use this when the user shares personal information, preferences, goals, important dates, \
or anything they might want you to remember in future conversations. \
Always reformulate the information in a clear, concise way that will be useful later.
Example: If user says \"I love playing guitar on weekends\", store as \"User enjoys playing guitar as a weekend hobby\".";

const RETRIEVE_DESCRIPTION: &str = "Search for relevant memories about the user based on the current conversation context.
Use this when you need to recall information about the user to provide personalized responses.
This performs semantic search to find the most relevant memories.";

pub struct StoreMemoryTool {
    memory: MemoryService,
    user_id: String,
}

#[async_trait]
impl AgentTool for StoreMemoryTool {
    fn name(&self) -> &'static str {
        "store_memory"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), STORE_DESCRIPTION, input_schema::<StoreMemoryArgs>())
    }

    async fn call(&self, arguments: serde_json::Value) -> String {
        let args: StoreMemoryArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return format!("Failed to store memory: invalid arguments: {e}"),
        };
        let metadata = args
            .category
            .map(|category| serde_json::json!({ "category": category }));

        match self.memory.store(&self.user_id, &args.content, metadata).await {
            Ok(_) => format!("Memory stored successfully: \"{}\"", args.content),
            Err(e) => {
                tracing::error!(error = %e, user_id = %self.user_id, "agent store_memory failed");
                format!("Failed to store memory: {e}")
            }
        }
    }
}

pub struct RetrieveMemoriesTool {
    memory: MemoryService,
    user_id: String,
}

#[async_trait]
impl AgentTool for RetrieveMemoriesTool {
    fn name(&self) -> &'static str {
        "retrieve_memories"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            RETRIEVE_DESCRIPTION,
            input_schema::<RetrieveMemoriesArgs>(),
        )
    }

    async fn call(&self, arguments: serde_json::Value) -> String {
        let args: RetrieveMemoriesArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return format!("Failed to retrieve memories: invalid arguments: {e}"),
        };
        let limit = args.limit.map_or(DEFAULT_RETRIEVE_LIMIT, |l| l as i64);

        match self
            .memory
            .retrieve(&self.user_id, &args.query, Some(limit), Some(DEFAULT_THRESHOLD))
            .await
        {
            Ok(results) if results.is_empty() => "No relevant memories found.".to_string(),
            Ok(results) => {
                let lines: Vec<String> = results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        format!(
                            "{}. {} (similarity: {:.1}%)",
                            i + 1,
                            r.memory.content,
                            r.similarity * 100.0
                        )
                    })
                    .collect();
                format!(
                    "Found {} relevant memories:\n{}",
                    results.len(),
                    lines.join("\n")
                )
            }
            Err(e) => {
                tracing::error!(error = %e, user_id = %self.user_id, "agent retrieve_memories failed");
                format!("Failed to retrieve memories: {e}")
            }
        }
    }
}

/// The tools available to one conversation.
pub struct ToolRegistry {
    tools: Vec<Box<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Box<dyn AgentTool>>) -> Self {
        Self { tools }
    }

    /// `store_memory` and `retrieve_memories`, scoped to `user_id`.
    pub fn memory_tools(memory: &MemoryService, user_id: &str) -> Self {
        Self::new(vec![
            Box::new(StoreMemoryTool {
                memory: memory.clone(),
                user_id: user_id.to_string(),
            }),
            Box::new(RetrieveMemoriesTool {
                memory: memory.clone(),
                user_id: user_id.to_string(),
            }),
        ])
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run one tool call and return the text fed back to the model.
    pub async fn execute(&self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            tracing::warn!(tool = name, "model requested an unknown tool");
            return format!("Error: unknown tool '{name}'");
        };

        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(raw) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(tool = name, error = %e, "unparsable tool arguments");
                    return format!("Error: invalid arguments for {name}: {e}");
                }
            }
        };

        tracing::info!(tool = name, call_id = %call.id, "executing agent tool");
        tool.call(arguments).await
    }
}
