#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use busy::api::AppState;
use busy::chat::llm::{ChatMessage, ChatModel, ToolCall, ToolChoice, ToolDefinition};
use busy::config::{BusyConfig, ChatMode};
use busy::db;
use busy::embedding::EmbeddingProvider;
use busy::error::BusyError;
use busy::memory::service::MemoryService;

/// Vector width used by every fake provider.
pub const DIMS: usize = 64;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database(DIMS).unwrap()
}

/// Insert a user row directly (no password hashing). Returns the user id.
pub fn insert_user(conn: &Connection, id: &str) -> String {
    conn.execute(
        "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, 'x', ?3)",
        rusqlite::params![id, format!("{id}@example.com"), db::timestamp_now()],
    )
    .unwrap();
    id.to_string()
}

/// Deterministic bag-of-words embedding: each lowercase word bumps one
/// hashed dimension, then the vector is L2-normalized. Identical texts have
/// similarity 1.0; texts sharing words are close.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
        v[(hash % DIMS as u64) as usize] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        v[0] = 1.0;
    } else {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// [`bag_of_words`] provider that counts how often it was called.
#[derive(Default)]
pub struct FakeEmbedding {
    calls: AtomicUsize,
}

impl FakeEmbedding {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BusyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn model(&self) -> &str {
        "fake-bag-of-words"
    }
}

/// Provider whose vectors contain NaN.
pub struct NanEmbedding;

#[async_trait]
impl EmbeddingProvider for NanEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, BusyError> {
        Ok(vec![f32::NAN; DIMS])
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn model(&self) -> &str {
        "nan"
    }
}

/// Chat model that replays canned replies, then answers "ok".
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<ChatMessage>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<ChatMessage>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every message list the model was called with, in order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
        _choice: ToolChoice,
    ) -> Result<ChatMessage, BusyError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ChatMessage::assistant("ok")))
    }
}

/// An assistant turn asking for a single tool call.
pub fn tool_call(id: &str, name: &str, arguments: Value) -> ChatMessage {
    ChatMessage::assistant_tool_calls(vec![ToolCall::function(id, name, arguments.to_string())])
}

pub fn memory_service(embedder: Arc<dyn EmbeddingProvider>) -> MemoryService {
    let conn = test_db();
    insert_user(&conn, "alice");
    insert_user(&conn, "bob");
    MemoryService::new(Arc::new(Mutex::new(conn)), embedder)
}

pub fn test_config(mode: ChatMode) -> BusyConfig {
    let mut config = BusyConfig::default();
    config.embedding.dimensions = DIMS;
    config.chat.mode = mode;
    config.chat.max_tool_steps = 4;
    config
}

/// Chat model whose every call fails, as an unreachable provider would.
pub struct FailingChat;

#[async_trait]
impl ChatModel for FailingChat {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
        _choice: ToolChoice,
    ) -> Result<ChatMessage, BusyError> {
        Err(BusyError::Llm("upstream returned 503: model overloaded".into()))
    }
}

/// A router over arbitrary providers, driven with `oneshot` requests.
pub struct HttpHarness {
    pub state: AppState,
    pub router: Router,
}

pub fn http_harness(
    mode: ChatMode,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn ChatModel>,
) -> HttpHarness {
    let state = busy::server::state_from_parts(test_db(), embedder, model, &test_config(mode));
    HttpHarness {
        router: busy::api::router(state.clone()),
        state,
    }
}

/// [`HttpHarness`] over the counting fake embedder and a scripted chat.
pub struct TestApp {
    pub http: HttpHarness,
    pub embedder: Arc<FakeEmbedding>,
    pub chat: Arc<ScriptedChat>,
}

impl std::ops::Deref for TestApp {
    type Target = HttpHarness;

    fn deref(&self) -> &HttpHarness {
        &self.http
    }
}

pub fn test_app(mode: ChatMode, replies: Vec<ChatMessage>) -> TestApp {
    let embedder = Arc::new(FakeEmbedding::default());
    let chat = Arc::new(ScriptedChat::new(replies));
    TestApp {
        http: http_harness(mode, embedder.clone(), chat.clone()),
        embedder,
        chat,
    }
}

impl HttpHarness {
    /// Create a user and log in; returns the `Cookie` header value.
    pub async fn login(&self, email: &str) -> String {
        {
            let conn = self.state.db.lock().unwrap();
            busy::auth::create_user(&conn, email, None, "correct horse").unwrap();
        }
        let req = Request::post("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"email": email, "password": "correct horse"}).to_string(),
            ))
            .unwrap();
        let resp = self.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookie = resp
            .headers()
            .get("set-cookie")
            .expect("login sets a cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// Send a JSON request (or none when `body` is `None`) and decode the reply.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
