//! Chat with an LLM, optionally letting it read and write the user's memories.

pub mod agent;
pub mod history;
pub mod llm;
pub mod tools;

use serde::Deserialize;
use std::sync::Arc;

use crate::config::{ChatConfig, ChatMode};
use crate::db::{db_call, SharedDb};
use crate::error::BusyError;
use crate::memory::service::MemoryService;
use agent::{run_tool_loop, AgentGraph};
use history::{append_message, LogRole};
use llm::{ChatMessage, ChatModel, Role, ToolChoice};
use tools::ToolRegistry;

pub const SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant with the ability to remember information about users.

IMPORTANT CAPABILITIES:
- You can store important information about users using the "store_memory" tool
- You can recall relevant information using the "retrieve_memories" tool
- Always check memories when answering questions that might benefit from personalized context

WHEN TO STORE MEMORIES:
- Personal information (name, preferences, hobbies, family)
- Work-related information (job, projects, colleagues)
- Goals and aspirations
- Important dates or events
- Recurring tasks or procedures
- Anything the user explicitly asks you to remember

HOW TO STORE MEMORIES:
- Reformulate information clearly and concisely
- Use third-person perspective (e.g., "User prefers..." instead of "I prefer...")
- Extract the key information without unnecessary context
- Store each distinct piece of information separately

WHEN TO RETRIEVE MEMORIES:
- At the start of conversations to understand user context
- When answering questions that could benefit from personal context
- When user asks about something they mentioned before

Be proactive in using these tools to provide a personalized experience."#;

/// A message as sent by the client. Unknown roles are treated as system text.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
}

impl IncomingMessage {
    fn to_chat_message(&self) -> ChatMessage {
        match self.role.as_str() {
            "user" => ChatMessage::user(&self.content),
            "assistant" => ChatMessage::assistant(&self.content),
            _ => ChatMessage::system(&self.content),
        }
    }
}

/// Map client history to model messages, prepending the system prompt
/// unless the history already carries a system message.
pub fn build_messages(history: &[IncomingMessage]) -> Vec<ChatMessage> {
    let converted: Vec<ChatMessage> = history.iter().map(IncomingMessage::to_chat_message).collect();
    if converted.iter().any(|m| m.role == Role::System) {
        converted
    } else {
        std::iter::once(ChatMessage::system(SYSTEM_PROMPT))
            .chain(converted)
            .collect()
    }
}

#[derive(Clone)]
pub struct ChatService {
    model: Arc<dyn ChatModel>,
    memory: MemoryService,
    db: SharedDb,
    mode: ChatMode,
    max_tool_steps: usize,
}

impl ChatService {
    pub fn new(model: Arc<dyn ChatModel>, memory: MemoryService, config: &ChatConfig) -> Self {
        Self {
            db: memory.db().clone(),
            model,
            memory,
            mode: config.mode,
            max_tool_steps: config.max_tool_steps.max(1),
        }
    }

    pub fn memory(&self) -> &MemoryService {
        &self.memory
    }

    /// Answer the conversation and record the exchange in the message log.
    pub async fn chat(
        &self,
        user_id: &str,
        history: &[IncomingMessage],
    ) -> Result<String, BusyError> {
        if user_id.trim().is_empty() {
            return Err(BusyError::Validation(
                "Invalid userId: must be a non-empty string".into(),
            ));
        }
        let Some(last) = history.last() else {
            return Err(BusyError::Validation("Messages array is required".into()));
        };

        let messages = build_messages(history);
        tracing::info!(user_id, mode = ?self.mode, turns = history.len(), "chat request");

        let reply = match self.mode {
            ChatMode::Plain => self
                .model
                .complete(&messages, &[], ToolChoice::Auto)
                .await?
                .text()
                .to_string(),
            ChatMode::Agent => {
                let tools = ToolRegistry::memory_tools(&self.memory, user_id);
                run_tool_loop(self.model.as_ref(), &tools, messages, self.max_tool_steps).await?
            }
            ChatMode::Graph => {
                let tools = ToolRegistry::memory_tools(&self.memory, user_id);
                AgentGraph::new(self.model.as_ref(), &tools, self.max_tool_steps)
                    .invoke(messages)
                    .await?
            }
        };

        let (uid, question, answer) = (user_id.to_string(), last.content.clone(), reply.clone());
        db_call(&self.db, move |conn| {
            append_message(conn, &uid, LogRole::User, &question)?;
            append_message(conn, &uid, LogRole::Assistant, &answer)?;
            Ok(())
        })
        .await?;

        Ok(reply)
    }
}
