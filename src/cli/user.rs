use anyhow::Result;

use crate::auth;
use crate::config::BusyConfig;
use crate::db;

/// Create a login for the HTTP API.
pub fn create_user(config: &BusyConfig, email: &str, password: &str, name: Option<&str>) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path(), config.embedding.dimensions)?;
    let user = auth::create_user(&conn, email, name, password)?;
    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}
