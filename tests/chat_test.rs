mod helpers;

use serde_json::json;
use std::sync::Arc;

use busy::chat::llm::{ChatMessage, Role};
use busy::chat::{ChatService, IncomingMessage};
use busy::config::ChatMode;
use busy::db::db_call;
use busy::chat::history;
use helpers::{memory_service, test_config, tool_call, FakeEmbedding, ScriptedChat};

fn user(content: &str) -> IncomingMessage {
    IncomingMessage {
        role: "user".into(),
        content: content.into(),
    }
}

fn service(mode: ChatMode, replies: Vec<ChatMessage>) -> (ChatService, Arc<ScriptedChat>) {
    let model = Arc::new(ScriptedChat::new(replies));
    let memory = memory_service(Arc::new(FakeEmbedding::default()));
    let chat = ChatService::new(model.clone(), memory, &test_config(mode).chat);
    (chat, model)
}

#[tokio::test]
async fn plain_mode_is_a_single_call_with_the_system_prompt() {
    let (chat, model) = service(ChatMode::Plain, vec![ChatMessage::assistant("Hello there!")]);

    let reply = chat.chat("alice", &[user("hi")]).await.unwrap();
    assert_eq!(reply, "Hello there!");

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0][0].role, Role::System);
    assert_eq!(requests[0][1].text(), "hi");
}

#[tokio::test]
async fn agent_mode_stores_memories_through_tools() {
    let (chat, model) = service(
        ChatMode::Agent,
        vec![
            tool_call("c1", "store_memory", json!({"content": "User's favorite color is teal"})),
            ChatMessage::assistant("Got it, teal it is."),
        ],
    );

    let reply = chat
        .chat("alice", &[user("My favorite color is teal")])
        .await
        .unwrap();
    assert_eq!(reply, "Got it, teal it is.");

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let tool_turn = requests[1].last().unwrap();
    assert_eq!(tool_turn.role, Role::Tool);
    assert!(tool_turn.text().starts_with("Memory stored successfully"));

    let stored = chat.memory().list("alice", None, None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "User's favorite color is teal");
    assert!(chat.memory().list("bob", None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn graph_mode_feeds_retrieval_results_back() {
    let (chat, model) = service(
        ChatMode::Graph,
        vec![
            tool_call("c1", "retrieve_memories", json!({"query": "User drinks oat milk lattes"})),
            ChatMessage::assistant("You like oat milk lattes."),
        ],
    );
    chat.memory()
        .store("alice", "User drinks oat milk lattes", None)
        .await
        .unwrap();

    let reply = chat
        .chat("alice", &[user("What coffee do I like?")])
        .await
        .unwrap();
    assert_eq!(reply, "You like oat milk lattes.");

    let tool_turn = model.requests()[1].last().unwrap().clone();
    assert_eq!(tool_turn.role, Role::Tool);
    assert!(tool_turn.text().starts_with("Found 1 relevant memories:"));
    assert!(tool_turn.text().contains("User drinks oat milk lattes"));
}

#[tokio::test]
async fn retrieval_tool_reports_empty_results() {
    let (chat, model) = service(
        ChatMode::Graph,
        vec![
            tool_call("c1", "retrieve_memories", json!({"query": "anything"})),
            ChatMessage::assistant("I don't know yet."),
        ],
    );

    chat.chat("bob", &[user("what do you know?")]).await.unwrap();
    let tool_turn = model.requests()[1].last().unwrap().clone();
    assert_eq!(tool_turn.text(), "No relevant memories found.");
}

#[tokio::test]
async fn runaway_tool_calls_are_cut_off() {
    let replies = (0..10)
        .map(|i| tool_call(&format!("c{i}"), "retrieve_memories", json!({"query": "loop"})))
        .collect();
    let (chat, model) = service(ChatMode::Agent, replies);

    chat.chat("alice", &[user("loop forever")]).await.unwrap();
    // four tool rounds plus the forced final answer
    assert_eq!(model.requests().len(), 5);
}

#[tokio::test]
async fn exchanges_are_logged_per_user() {
    let (chat, _model) = service(ChatMode::Plain, vec![ChatMessage::assistant("first answer")]);

    chat.chat("alice", &[user("first question")]).await.unwrap();

    let db = chat.memory().db().clone();
    let log = db_call(&db, |conn| history::recent_messages(conn, "alice", 10))
        .await
        .unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "first question");
    assert_eq!(log[1].content, "first answer");

    let other = db_call(&db, |conn| history::recent_messages(conn, "bob", 10))
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn empty_history_is_rejected_without_calling_the_model() {
    let (chat, model) = service(ChatMode::Agent, vec![]);
    assert!(chat.chat("alice", &[]).await.is_err());
    assert!(chat.chat("  ", &[user("hi")]).await.is_err());
    assert!(model.requests().is_empty());
}
