//! Asynchronous unit-of-work session over a sqlx SQLite pool.
//!
//! # Responsibility
//! - Cache one pool per database identity (`EngineRegistry`).
//! - Hold at most one open transaction per session and route reads through
//!   it so staged writes stay visible.
//! - Mirror the synchronous scope policy in `finish`.
//!
//! # Invariants
//! - Suspension happens only at pool acquire, statement execution, commit
//!   and rollback.
//! - In-memory pools hold exactly one connection that never idles out.

use super::migrations::{apply_migrations_async, Migration};
use super::open::BUSY_TIMEOUT;
use super::session::TransactionalError;
use super::{DatabaseType, DbError, DbLocation, DbResult};
use crate::model::value::SqlValue;
use log::{debug, error, info};
use sqlx::pool::PoolOptions;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const FILE_POOL_MAX_CONNECTIONS: u32 = 5;

/// Pools keyed by `"{database_type}-{name}"`.
#[derive(Debug, Default, Clone)]
pub struct EngineRegistry {
    pools: Arc<Mutex<HashMap<String, SqlitePool>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached pool for this identity, connecting and migrating
    /// on first use.
    pub async fn get_or_connect(
        &self,
        database_type: DatabaseType,
        database_url: &str,
        database_name: Option<&str>,
        migrations: &[Migration],
    ) -> DbResult<SqlitePool> {
        database_type.ensure_supported()?;
        let key = format!(
            "{}-{}",
            database_type,
            database_name.unwrap_or(database_url)
        );

        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }

        let location = DbLocation::parse(database_url)?;
        let pool = connect_pool(&location).await?;
        let mut conn = pool.acquire().await?;
        apply_migrations_async(&mut conn, migrations).await?;
        drop(conn);

        info!("event=engine_create module=db status=ok key={}", key);
        pools.insert(key, pool.clone());
        Ok(pool)
    }

    pub async fn len(&self) -> usize {
        self.pools.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.lock().await.is_empty()
    }
}

async fn connect_pool(location: &DbLocation) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = match location {
        DbLocation::Memory => {
            PoolOptions::<Sqlite>::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options.in_memory(true))
                .await?
        }
        DbLocation::File(path) => {
            PoolOptions::<Sqlite>::new()
                .max_connections(FILE_POOL_MAX_CONNECTIONS)
                .connect_with(options.filename(path).create_if_missing(true))
                .await?
        }
    };
    Ok(pool)
}

/// Opens async sessions against one configured database.
#[derive(Debug, Clone)]
pub struct AsyncSessionFactory {
    registry: EngineRegistry,
    database_type: DatabaseType,
    database_url: String,
    database_name: Option<String>,
    migrations: &'static [Migration],
}

impl AsyncSessionFactory {
    pub fn new(
        registry: EngineRegistry,
        database_type: DatabaseType,
        database_url: impl Into<String>,
        database_name: Option<String>,
        migrations: &'static [Migration],
    ) -> DbResult<Self> {
        database_type.ensure_supported()?;
        let database_url = database_url.into();
        DbLocation::parse(&database_url)?;
        Ok(Self {
            registry,
            database_type,
            database_url,
            database_name,
            migrations,
        })
    }

    pub async fn open(&self) -> DbResult<AsyncSession> {
        let pool = self
            .registry
            .get_or_connect(
                self.database_type,
                &self.database_url,
                self.database_name.as_deref(),
                self.migrations,
            )
            .await?;
        Ok(AsyncSession::new(pool))
    }
}

/// One asynchronous unit of work.
pub struct AsyncSession {
    pool: SqlitePool,
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl AsyncSession {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Runs a read statement, inside the pending transaction if any.
    pub(crate) async fn fetch_all(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Vec<SqliteRow>> {
        let mut guard = self.tx.lock().await;
        let query = bind_all(sqlx::query(sql), params);
        let rows = match guard.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        Ok(rows)
    }

    /// Runs a write statement inside the pending transaction, opening one
    /// first when needed. Returns the affected row count.
    pub(crate) async fn execute_write(&self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let mut guard = self.tx.lock().await;
        if guard.is_none() {
            *guard = Some(self.pool.begin().await?);
            debug!("event=session_begin module=db status=ok mode=async");
        }
        let query = bind_all(sqlx::query(sql), params);
        let tx = guard
            .as_mut()
            .ok_or_else(|| DbError::Internal("transaction vanished".to_string()))?;
        let result = query.execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    pub async fn commit(&self) -> DbResult<()> {
        let pending = self.tx.lock().await.take();
        if let Some(tx) = pending {
            tx.commit().await?;
            debug!("event=session_commit module=db status=ok mode=async");
        }
        Ok(())
    }

    pub async fn rollback(&self) -> DbResult<()> {
        let pending = self.tx.lock().await.take();
        if let Some(tx) = pending {
            tx.rollback().await?;
            debug!("event=session_rollback module=db status=ok mode=async");
        }
        Ok(())
    }

    /// Async counterpart of [`super::Session::finish`].
    ///
    /// Dropping a pending sqlx transaction returns its connection to the pool
    /// rolled back, so the non-internal error path needs no extra step.
    pub async fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: TransactionalError + From<DbError> + std::fmt::Display,
    {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) if err.is_internal() => {
                error!(
                    "event=session_rollback module=db status=error mode=async reason=internal error={}",
                    err
                );
                let _ = self.rollback().await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in params {
        query = match value.to_storage() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(v),
            SqlValue::Real(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            other => query.bind(other.to_string()),
        };
    }
    query
}
