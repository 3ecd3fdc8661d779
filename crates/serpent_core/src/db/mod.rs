//! Relational storage bootstrap, sessions and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections (sync via rusqlite, async via sqlx).
//! - Apply caller-supplied schema migrations in deterministic order.
//! - Scope units of work with explicit commit/rollback.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Only `DatabaseType::Sqlite` is executable; other kinds are rejected
//!   before any connection is attempted.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub mod async_session;
pub mod migrations;
mod open;
pub mod session;

pub use async_session::{AsyncSession, AsyncSessionFactory, EngineRegistry};
pub use open::{open_db, open_db_in_memory};
pub use session::{Session, SessionFactory, TransactionalError};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Sqlx(sqlx::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    UnsupportedDatabase(DatabaseType),
    InvalidUrl(String),
    /// Designated internal failure; session scopes roll back on it.
    Internal(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Sqlx(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UnsupportedDatabase(kind) => write!(f, "database type {kind} not supported"),
            Self::InvalidUrl(url) => write!(f, "invalid database url `{url}`"),
            Self::Internal(message) => write!(f, "internal database error: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Sqlx(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. }
            | Self::UnsupportedDatabase(_)
            | Self::InvalidUrl(_)
            | Self::Internal(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(value: sqlx::Error) -> Self {
        Self::Sqlx(value)
    }
}

/// Database kind selector carried next to the connection url.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    Sqlite,
    Databricks,
    Postgres,
    AzureSql,
}

impl DatabaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Databricks => "databricks",
            Self::Postgres => "postgres",
            Self::AzureSql => "azuresql",
        }
    }

    /// Returns an error unless this kind can be opened by core.
    pub fn ensure_supported(self) -> DbResult<()> {
        match self {
            Self::Sqlite => Ok(()),
            other => Err(DbError::UnsupportedDatabase(other)),
        }
    }
}

impl Display for DatabaseType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "databricks" => Ok(Self::Databricks),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "azuresql" => Ok(Self::AzureSql),
            other => Err(format!(
                "unsupported database type `{other}`; expected sqlite|databricks|postgres|azuresql"
            )),
        }
    }
}

/// Where a SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

impl DbLocation {
    /// Parses a SQLAlchemy-style SQLite url.
    ///
    /// Accepts `sqlite://` and `sqlite://:memory:` / `:memory:` for an
    /// in-memory database, `sqlite:///<path>` for a file (so
    /// `sqlite:////tmp/app.db` is absolute), and bare filesystem paths.
    pub fn parse(url: &str) -> DbResult<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(DbError::InvalidUrl(url.to_string()));
        }

        if matches!(trimmed, ":memory:" | "sqlite://" | "sqlite://:memory:") {
            return Ok(Self::Memory);
        }

        if let Some(path) = trimmed.strip_prefix("sqlite:///") {
            if path.is_empty() {
                return Err(DbError::InvalidUrl(url.to_string()));
            }
            return Ok(Self::File(PathBuf::from(path)));
        }

        if trimmed.contains("://") {
            return Err(DbError::InvalidUrl(url.to_string()));
        }

        Ok(Self::File(PathBuf::from(trimmed)))
    }
}
