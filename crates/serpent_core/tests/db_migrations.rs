mod common;

use common::MIGRATIONS;
use rusqlite::Connection;
use serpent_core::db::migrations::latest_version;
use serpent_core::db::{open_db, open_db_in_memory, AsyncSessionFactory, DbError, EngineRegistry};
use serpent_core::{DatabaseType, SessionFactory};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory(MIGRATIONS).unwrap();

    assert_eq!(schema_version(&conn), latest_version(MIGRATIONS));
    assert_table_exists(&conn, "author");
    assert_table_exists(&conn, "book");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serpent.db");

    let conn_first = open_db(&path, MIGRATIONS).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version(MIGRATIONS));
    drop(conn_first);

    let conn_second = open_db(&path, MIGRATIONS).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version(MIGRATIONS));
    assert_table_exists(&conn_second, "book");
}

#[test]
fn later_migrations_apply_on_top_of_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serpent.db");

    drop(open_db(&path, &MIGRATIONS[..1]).unwrap());
    let conn = open_db(&path, MIGRATIONS).unwrap();

    assert_eq!(schema_version(&conn), 2);
    assert_table_exists(&conn, "book");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, MIGRATIONS).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version(MIGRATIONS));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn opened_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory(MIGRATIONS).unwrap();
    let err = conn
        .execute(
            "INSERT INTO book (id, created_on, updated_on, title, pages, author_id)
             VALUES ('b', 't', 't', 'orphan', 1, 'missing-author')",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn session_factory_rejects_unsupported_database_types() {
    let err = SessionFactory::new(DatabaseType::Postgres, "sqlite://", MIGRATIONS).unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedDatabase(DatabaseType::Postgres)
    ));

    let err = SessionFactory::new(DatabaseType::Sqlite, "postgres://db/app", MIGRATIONS)
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidUrl(_)));
}

#[tokio::test]
async fn engine_registry_reuses_pool_per_identity() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:///{}", dir.path().join("async.db").display());
    let registry = EngineRegistry::new();

    registry
        .get_or_connect(DatabaseType::Sqlite, &url, Some("main"), MIGRATIONS)
        .await
        .unwrap();
    registry
        .get_or_connect(DatabaseType::Sqlite, &url, Some("main"), MIGRATIONS)
        .await
        .unwrap();
    assert_eq!(registry.len().await, 1);

    registry
        .get_or_connect(DatabaseType::Sqlite, "sqlite://", Some("scratch"), MIGRATIONS)
        .await
        .unwrap();
    assert_eq!(registry.len().await, 2);

    let conn = open_db(dir.path().join("async.db"), MIGRATIONS).unwrap();
    assert_eq!(schema_version(&conn), latest_version(MIGRATIONS));
}

#[tokio::test]
async fn async_factory_rejects_unsupported_database_types() {
    let err = AsyncSessionFactory::new(
        EngineRegistry::new(),
        DatabaseType::Databricks,
        "sqlite://",
        None,
        MIGRATIONS,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedDatabase(DatabaseType::Databricks)
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
