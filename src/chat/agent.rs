//! Tool-calling loops.
//!
//! Two drivers over the same [`ChatModel`] and [`ToolRegistry`]:
//! [`run_tool_loop`] iterates directly, [`AgentGraph`] walks an explicit
//! agent → tools → agent state graph. Both stop after `max_tool_steps` tool
//! rounds and then ask the model once more with tool calls disabled.

use super::llm::{ChatMessage, ChatModel, ToolChoice};
use super::tools::ToolRegistry;
use crate::error::BusyError;

/// Execute every tool call of `reply` and append the assistant turn plus one
/// tool result per call.
async fn run_tools(tools: &ToolRegistry, reply: ChatMessage, messages: &mut Vec<ChatMessage>) {
    let calls = reply.tool_calls.clone();
    messages.push(reply);
    for call in &calls {
        let output = tools.execute(call).await;
        messages.push(ChatMessage::tool_result(&call.id, output));
    }
}

/// Final answer once the tool budget is spent.
async fn finalize(
    model: &dyn ChatModel,
    tools: &ToolRegistry,
    messages: &[ChatMessage],
    steps: usize,
) -> Result<String, BusyError> {
    tracing::warn!(steps, "maximum tool steps reached, forcing text response");
    let reply = model
        .complete(messages, &tools.definitions(), ToolChoice::None)
        .await?;
    Ok(reply.text().to_string())
}

pub async fn run_tool_loop(
    model: &dyn ChatModel,
    tools: &ToolRegistry,
    mut messages: Vec<ChatMessage>,
    max_tool_steps: usize,
) -> Result<String, BusyError> {
    let definitions = tools.definitions();

    for step in 0..max_tool_steps {
        let reply = model
            .complete(&messages, &definitions, ToolChoice::Auto)
            .await?;
        if reply.tool_calls.is_empty() {
            return Ok(reply.text().to_string());
        }
        tracing::info!(step, tool_count = reply.tool_calls.len(), "executing tool calls");
        run_tools(tools, reply, &mut messages).await;
    }

    finalize(model, tools, &messages, max_tool_steps).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Agent,
    Tools,
    End,
}

/// Conditional edge out of the agent node.
pub fn should_continue(last: &ChatMessage) -> Node {
    if last.tool_calls.is_empty() {
        Node::End
    } else {
        Node::Tools
    }
}

pub struct AgentGraph<'a> {
    model: &'a dyn ChatModel,
    tools: &'a ToolRegistry,
    max_tool_steps: usize,
}

impl<'a> AgentGraph<'a> {
    pub fn new(model: &'a dyn ChatModel, tools: &'a ToolRegistry, max_tool_steps: usize) -> Self {
        Self {
            model,
            tools,
            max_tool_steps,
        }
    }

    /// Walk the graph from the agent node; returns the text of the last message.
    pub async fn invoke(&self, mut messages: Vec<ChatMessage>) -> Result<String, BusyError> {
        let definitions = self.tools.definitions();
        let mut node = Node::Agent;
        let mut steps = 0usize;
        let mut pending: Option<ChatMessage> = None;

        loop {
            node = match node {
                Node::Agent => {
                    let reply = self
                        .model
                        .complete(&messages, &definitions, ToolChoice::Auto)
                        .await?;
                    let next = should_continue(&reply);
                    if next == Node::End {
                        return Ok(reply.text().to_string());
                    }
                    pending = Some(reply);
                    next
                }
                Node::Tools => {
                    if let Some(reply) = pending.take() {
                        run_tools(self.tools, reply, &mut messages).await;
                    }
                    steps += 1;
                    if steps >= self.max_tool_steps {
                        Node::End
                    } else {
                        Node::Agent
                    }
                }
                Node::End => {
                    return finalize(self.model, self.tools, &messages, steps).await;
                }
            };
        }
    }
}
