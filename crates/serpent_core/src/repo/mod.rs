//! Generic record repositories.
//!
//! # Responsibility
//! - Define the sync and async repository contracts over any [`Record`].
//! - Share statement rendering and request validation between engines.
//!
//! # Invariants
//! - `update` never writes when the target id is absent.
//! - `delete` of an absent id writes nothing but still honours `defer_commit`.
//! - Non-deferred writes are committed and re-read before returning.

pub mod async_repo;
pub mod sql_repo;

use crate::db::{DbError, TransactionalError};
use crate::model::record::{Record, RecordId};
use crate::model::schema::{Schema, SchemaError, ID_COLUMN};
use crate::model::value::{RecordError, SqlValue};
use crate::query::{Filter, PaginatedList, QueryError, QuerySpec, SearchSpec};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use async_repo::AsyncSqlRepository;
pub use sql_repo::SqlRepository;

/// Default page size for [`ListQuery`].
pub const DEFAULT_LIST_LIMIT: u64 = 100;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input rejected before or instead of a write.
    Validation(String),
    Query(QueryError),
    Schema(SchemaError),
    Record(RecordError),
    Db(DbError),
    /// Unexpected state; session scopes roll back on this kind.
    Internal(String),
}

impl RepoError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Query(_) | Self::Schema(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Record(err) => write!(f, "invalid persisted record data: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Internal(message) => write!(f, "internal repository error: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Record(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Validation(_) | Self::Internal(_) => None,
        }
    }
}

impl TransactionalError for RepoError {
    fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<SchemaError> for RepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<RecordError> for RepoError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(value: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(value))
    }
}

/// Filtered page without totals, search or ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub skip: u64,
    pub limit: u64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            skip: 0,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Full paginated request. `limit = None` disables pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    pub filter: Filter,
    pub skip: u64,
    pub limit: Option<u64>,
    /// Field paths, `-` prefixed for descending.
    pub order_by: Vec<String>,
    pub search_fields: Vec<String>,
    pub search_text: Option<String>,
}

/// Synchronous repository contract for one record type.
pub trait RecordRepository<R: Record> {
    fn exists(&self, filter: &Filter) -> RepoResult<bool>;
    fn get_by_id(&self, id: RecordId) -> RepoResult<Option<R>>;
    fn get_models_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<R>>;
    fn get(&self, query: &ListQuery) -> RepoResult<Vec<R>>;
    fn get_paginated(&self, request: &PageRequest) -> RepoResult<PaginatedList<R>>;
    fn create(&self, record: R, defer_commit: bool) -> RepoResult<R>;
    fn update(&self, record: R, defer_commit: bool) -> RepoResult<R>;
    fn delete(&self, id: RecordId, defer_commit: bool) -> RepoResult<()>;
}

/// Asynchronous repository contract for one record type.
#[async_trait]
pub trait AsyncRecordRepository<R: Record>: Send + Sync {
    async fn exists(&self, filter: &Filter) -> RepoResult<bool>;
    async fn get_by_id(&self, id: RecordId) -> RepoResult<Option<R>>;
    async fn get_models_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<R>>;
    async fn get(&self, query: &ListQuery) -> RepoResult<Vec<R>>;
    async fn get_paginated(&self, request: &PageRequest) -> RepoResult<PaginatedList<R>>;
    async fn create(&self, record: R, defer_commit: bool) -> RepoResult<R>;
    async fn update(&self, record: R, defer_commit: bool) -> RepoResult<R>;
    async fn delete(&self, id: RecordId, defer_commit: bool) -> RepoResult<()>;
}

pub(crate) fn validated_schema<R: Record>() -> RepoResult<&'static Schema> {
    let schema = R::schema();
    schema.validate()?;
    Ok(schema)
}

pub(crate) fn by_id_spec(id: RecordId) -> QuerySpec {
    QuerySpec::filtered(Filter::new().eq(ID_COLUMN, id))
}

pub(crate) fn ensure_limit(limit: Option<u64>) -> RepoResult<()> {
    if limit == Some(0) {
        return Err(RepoError::Validation(
            "limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn page_spec(request: &PageRequest) -> QuerySpec {
    let search = request.search_text.as_ref().map(|text| SearchSpec {
        text: text.clone(),
        fields: request.search_fields.clone(),
    });
    QuerySpec {
        filter: request.filter.clone(),
        ids: None,
        search,
        order_by: request.order_by.clone(),
    }
}

/// Rejects caller-supplied ids that are not UUID v4.
pub(crate) fn ensure_valid_id<R: Record>(record: &R) -> RepoResult<()> {
    record
        .meta()
        .validate_id()
        .map_err(|err| RepoError::Validation(err.to_string()))
}

pub(crate) fn require_id<R: Record>(record: &R) -> RepoResult<RecordId> {
    record.id().ok_or_else(|| {
        RepoError::Validation(format!(
            "The id of the existing model ({}) is required for update action",
            R::schema().record_name()
        ))
    })
}

pub(crate) fn not_found<R: Record>(id: RecordId) -> RepoError {
    RepoError::Validation(format!(
        "Model of type {} with id: {id} not found",
        R::schema().record_name()
    ))
}

/// Stored values in `schema.all_columns()` order.
pub(crate) fn write_values<R: Record>(record: &R) -> RepoResult<Vec<SqlValue>> {
    let schema = R::schema();
    let meta = record.meta();
    let mut declared = record.values();
    for (name, _) in &declared {
        if schema.columns().iter().all(|column| column.name != *name) {
            return Err(RecordError::UnknownColumn {
                record: schema.record_name().to_string(),
                column: (*name).to_string(),
            }
            .into());
        }
    }

    let mut values = vec![
        SqlValue::from(meta.id),
        SqlValue::from(meta.created_on),
        SqlValue::from(meta.updated_on),
    ];
    for column in schema.columns() {
        let position = declared
            .iter()
            .position(|(name, _)| *name == column.name)
            .ok_or_else(|| RecordError::MissingColumn(column.name.to_string()))?;
        values.push(declared.swap_remove(position).1);
    }
    Ok(values)
}

pub(crate) fn insert_sql(schema: &Schema) -> String {
    let names = schema
        .all_columns()
        .map(|column| format!("\"{}\"", column.name))
        .collect::<Vec<_>>();
    let placeholders = vec!["?"; names.len()].join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({placeholders})",
        schema.table(),
        names.join(", ")
    )
}

/// `UPDATE` binding every non-id column in order, then the id.
pub(crate) fn update_sql(schema: &Schema) -> String {
    let assignments = schema
        .all_columns()
        .filter(|column| column.name != ID_COLUMN)
        .map(|column| format!("\"{}\" = ?", column.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE \"{}\" SET {assignments} WHERE \"{ID_COLUMN}\" = ?",
        schema.table()
    )
}

pub(crate) fn delete_sql(schema: &Schema) -> String {
    format!(
        "DELETE FROM \"{}\" WHERE \"{ID_COLUMN}\" = ?",
        schema.table()
    )
}

/// Reorders insert values (`id` first) into update bind order (`id` last).
pub(crate) fn update_params(mut values: Vec<SqlValue>) -> Vec<SqlValue> {
    if !values.is_empty() {
        let id = values.remove(0);
        values.push(id);
    }
    values
}
