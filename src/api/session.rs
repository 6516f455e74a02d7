use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::{ApiError, AppState, AuthUser, OrFail};
use crate::auth;
use crate::db::db_call;
use crate::error::BusyError;

#[derive(Deserialize)]
pub(super) struct LoginBody {
    email: String,
    password: String,
}

fn session_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub(super) async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let Json(body) =
        body.map_err(|_| BusyError::Validation("Email and password are required".into()))?;

    let ttl = state.auth.session_ttl_hours;
    let session = db_call(&state.db, move |conn| {
        auth::login(conn, &body.email, &body.password, ttl)
    })
    .await
    .or_fail("Failed to log in")?;

    let jar = jar.add(session_cookie(&state.auth.cookie_name, session.token));
    Ok((
        jar,
        Json(serde_json::json!({ "success": true, "user": session.user })),
    ))
}

pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let token = user.token.clone();
    db_call(&state.db, move |conn| auth::logout(conn, &token))
        .await
        .or_fail("Failed to log out")?;

    tracing::info!(user_id = %user.id, "session closed");
    let jar = jar.remove(session_cookie(&state.auth.cookie_name, String::new()));
    Ok((jar, Json(serde_json::json!({ "success": true }))))
}
