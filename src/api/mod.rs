//! HTTP API: session login, memory CRUD and search, chat.
//!
//! Every route except health and login sits behind [`require_session`],
//! which resolves the session cookie to an [`AuthUser`] request extension.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::chat::ChatService;
use crate::config::AuthConfig;
use crate::db::{db_call, SharedDb};
use crate::error::BusyError;
use crate::memory::service::MemoryService;

mod chat;
mod memory;
mod session;

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub memory: MemoryService,
    pub chat: ChatService,
    pub auth: AuthConfig,
}

/// The user behind the request's session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub token: String,
}

/// A handler error. Internal failures are logged and replaced by a
/// route-specific message; client errors pass through unchanged.
pub struct ApiError {
    source: BusyError,
    public: &'static str,
}

impl From<BusyError> for ApiError {
    fn from(source: BusyError) -> Self {
        Self {
            source,
            public: "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.source.is_internal() {
            tracing::error!(error = %self.source, "{}", self.public);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": self.public })),
            )
                .into_response()
        } else {
            self.source.into_response()
        }
    }
}

pub(crate) trait OrFail<T> {
    /// Attach the message a client sees if this turns out to be a 500.
    fn or_fail(self, public: &'static str) -> Result<T, ApiError>;
}

impl<T> OrFail<T> for Result<T, BusyError> {
    fn or_fail(self, public: &'static str) -> Result<T, ApiError> {
        self.map_err(|source| ApiError { source, public })
    }
}

async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, BusyError> {
    let token = jar
        .get(&state.auth.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(BusyError::Unauthorized)?;

    let lookup = token.clone();
    let user_id = db_call(&state.db, move |conn| auth::lookup_session(conn, &lookup))
        .await?
        .ok_or(BusyError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser { id: user_id, token });
    Ok(next.run(req).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(session::login));

    let protected = Router::new()
        .route("/api/auth/logout", post(session::logout))
        .route(
            "/api/memory",
            post(memory::create_memory)
                .get(memory::list_or_search)
                .put(memory::update_memory)
                .delete(memory::delete_memory),
        )
        .route("/api/memory/{id}", get(memory::get_memory))
        .route("/api/chat", post(chat::chat))
        .route("/api/messages", get(chat::recent_messages))
        .layer(middleware::from_fn_with_state(state.clone(), require_session));

    public
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
