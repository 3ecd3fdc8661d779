//! SQLite migration executor for caller-owned schemas.
//!
//! # Responsibility
//! - Apply a consumer-supplied migration list in strictly increasing order.
//! - Apply pending migrations atomically, on rusqlite or sqlx connections.
//!
//! # Invariants
//! - `version` values must remain monotonic within one list.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;
use sqlx::{Connection as _, SqliteConnection};

/// One schema step. Consumers keep these in a `static` slice.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub sql: &'static str,
}

impl Migration {
    pub const fn new(version: u32, sql: &'static str) -> Self {
        Self { version, sql }
    }
}

/// Returns the latest migration version in `migrations`.
pub fn latest_version(migrations: &[Migration]) -> u32 {
    migrations.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version(migrations);
    if !needs_migration(current_version, latest)? {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending(migrations, current_version) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

/// Async counterpart of [`apply_migrations`] for sqlx connections.
pub async fn apply_migrations_async(
    conn: &mut SqliteConnection,
    migrations: &[Migration],
) -> DbResult<()> {
    let current_version: i64 = sqlx::query_scalar("PRAGMA user_version;")
        .fetch_one(&mut *conn)
        .await?;
    let current_version = u32::try_from(current_version)
        .map_err(|_| DbError::Internal(format!("invalid user_version {current_version}")))?;
    let latest = latest_version(migrations);
    if !needs_migration(current_version, latest)? {
        return Ok(());
    }

    let mut tx = conn.begin().await?;
    for migration in pending(migrations, current_version) {
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
        sqlx::raw_sql(&format!("PRAGMA user_version = {};", migration.version))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(())
}

fn needs_migration(current_version: u32, latest: u32) -> DbResult<bool> {
    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    Ok(current_version < latest)
}

fn pending(migrations: &[Migration], current_version: u32) -> impl Iterator<Item = &Migration> {
    migrations
        .iter()
        .filter(move |migration| migration.version > current_version)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
