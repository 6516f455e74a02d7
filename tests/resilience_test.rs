mod helpers;

use busy::db;
use busy::memory::store;
use helpers::{bag_of_words, insert_user, DIMS};
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path, DIMS).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    let conn = helpers::test_db();

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert!(!report.sqlite_vec_version.is_empty());
    assert_eq!(report.embedding_dimensions, Some(DIMS));
    assert_eq!(report.user_count, 0);
    assert_eq!(report.memory_count, 0);
    assert_eq!(report.message_count, 0);
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db"), DIMS).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn reopen_preserves_memories_and_vectors() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("busy.db");

    let id = {
        let mut conn = db::open_database(&db_path, DIMS).unwrap();
        insert_user(&conn, "alice");
        let text = "User keeps bees on the roof";
        let memory = store::insert_memory(
            &mut conn,
            "alice",
            text,
            &Default::default(),
            &bag_of_words(text),
            DIMS,
        )
        .unwrap();
        memory.id
    };

    let conn = db::open_database(&db_path, DIMS).unwrap();
    let report = db::check_database_health(&conn).unwrap();
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(report.memory_count, 1);

    let vectors: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM memories_vec WHERE id = ?1",
            [&id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(vectors, 1);
}

#[test]
fn reopen_with_other_dimensions_keeps_the_recorded_width() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("busy.db");
    drop(db::open_database(&db_path, DIMS).unwrap());

    let conn = db::open_database(&db_path, DIMS * 2).unwrap();
    assert_eq!(
        db::migrations::get_embedding_dimensions(&conn).unwrap(),
        Some(DIMS)
    );
}
