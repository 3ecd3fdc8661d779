//! Core data-access and service toolkit for Serpent.
//! This crate is the single source of truth for persistence invariants.

pub mod auth;
pub mod azure;
pub mod cache;
pub mod config;
pub mod cosmos;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod util;

pub use config::{ConfigError, Settings};
pub use db::migrations::Migration;
pub use db::{
    AsyncSession, AsyncSessionFactory, DatabaseType, DbError, DbResult, EngineRegistry, Session,
    SessionFactory,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{Record, RecordId, RecordMeta, ValueRow};
pub use model::schema::{Column, ColumnKind, Schema};
pub use model::value::{RecordError, SqlValue};
pub use query::{Filter, PaginatedList};
pub use repo::{
    AsyncRecordRepository, AsyncSqlRepository, ListQuery, PageRequest, RecordRepository,
    RepoError, RepoResult, SqlRepository,
};
pub use service::Manager;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
