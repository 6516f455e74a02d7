//! Users, password hashing, and cookie sessions.
//!
//! Passwords are stored as Argon2id PHC strings. A session is an opaque
//! random token with an expiry; expired rows are ignored on lookup and
//! swept on the next login.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::timestamp_now;
use crate::error::BusyError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, BusyError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| BusyError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

pub fn create_user(
    conn: &Connection,
    email: &str,
    name: Option<&str>,
    password: &str,
) -> Result<User, BusyError> {
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(BusyError::Validation("A valid email is required".into()));
    }
    if password.is_empty() {
        return Err(BusyError::Validation("Password is required".into()));
    }
    if find_user_by_email(conn, &email)?.is_some() {
        return Err(BusyError::Validation(
            "A user with this email already exists".into(),
        ));
    }

    let user = User {
        id: uuid::Uuid::now_v7().to_string(),
        email,
        name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        created_at: timestamp_now(),
    };
    let password_hash = hash_password(password)?;
    conn.execute(
        "INSERT INTO users (id, email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.id, user.email, user.name, password_hash, user.created_at],
    )?;

    tracing::info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, BusyError> {
    let user = conn
        .query_row(
            "SELECT id, email, name, created_at FROM users WHERE email = ?1",
            params![normalize_email(email)],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Check credentials and open a new session valid for `ttl_hours`.
pub fn login(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl_hours: i64,
) -> Result<Session, BusyError> {
    let row: Option<(User, String)> = conn
        .query_row(
            "SELECT id, email, name, created_at, password_hash FROM users WHERE email = ?1",
            params![normalize_email(email)],
            |row| {
                let user = User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                };
                Ok((user, row.get(4)?))
            },
        )
        .optional()?;

    let Some((user, _)) = row.filter(|(_, hash)| verify_password(password, hash)) else {
        tracing::warn!(email = %normalize_email(email), "failed login");
        return Err(BusyError::InvalidCredentials);
    };

    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::hours(ttl_hours))
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    let token = uuid::Uuid::new_v4().simple().to_string();

    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND expires_at <= ?2",
        params![user.id, timestamp_now()],
    )?;
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, user.id, timestamp_now(), expires_at],
    )?;

    tracing::info!(user_id = %user.id, "session opened");
    Ok(Session {
        token,
        user,
        expires_at,
    })
}

/// Resolve a session token to its user id. Expired or unknown tokens yield `None`.
pub fn lookup_session(conn: &Connection, token: &str) -> Result<Option<String>, BusyError> {
    let user_id = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
            params![token, timestamp_now()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id)
}

pub fn logout(conn: &Connection, token: &str) -> Result<(), BusyError> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}
