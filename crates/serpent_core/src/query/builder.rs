//! SQL construction for one record type.
//!
//! # Responsibility
//! - Resolve dotted field paths against a [`Schema`], collecting joins.
//! - Render select, count and exists statements sharing one parameter list.
//!
//! # Invariants
//! - The base table is aliased `base`; each relation joins once as
//!   `rel_<name>`.
//! - Search terminal columns are text-typed, checked before any SQL runs.
//! - Count and exists statements never carry order-only joins.

use super::search::SearchSpec;
use crate::model::schema::{Column, Relation, Schema, ID_COLUMN};
use crate::model::value::SqlValue;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const BASE_ALIAS: &str = "base";

/// Field-path resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    UnknownField { record: String, path: String },
    NotAColumn { record: String, path: String },
    JoinTooDeep { record: String, path: String },
    NotText { record: String, path: String },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField { record, path } => {
                write!(f, "'{record}' has no attribute '{path}'")
            }
            Self::NotAColumn { record, path } => {
                write!(f, "'{record}' field '{path}' is a relationship, not a column")
            }
            Self::JoinTooDeep { record, path } => {
                write!(f, "'{record}' field '{path}' crosses more than one relationship")
            }
            Self::NotText { path, .. } => {
                write!(f, "Field '{path}' is not a string or text column")
            }
        }
    }
}

impl Error for QueryError {}

/// Ordered equality conditions. `SqlValue::Null` matches `IS NULL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, SqlValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `field = value`; `field` may be a one-hop dotted path.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.conditions
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }
}

/// Everything a read query may constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filter: Filter,
    pub ids: Option<Vec<Uuid>>,
    pub search: Option<SearchSpec>,
    /// Field paths, `-` prefixed for descending.
    pub order_by: Vec<String>,
}

impl QuerySpec {
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn by_ids(ids: &[Uuid]) -> Self {
        Self {
            ids: Some(ids.to_vec()),
            ..Self::default()
        }
    }
}

/// Unexecuted statements for one query specification.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub select_sql: String,
    pub count_sql: String,
    pub exists_sql: String,
    pub params: Vec<SqlValue>,
}

impl BuiltQuery {
    /// Appends a page clause to the select statement.
    ///
    /// Returns the statement and its full parameter list.
    pub fn paged(&self, skip: u64, limit: Option<u64>) -> (String, Vec<SqlValue>) {
        let mut sql = self.select_sql.clone();
        let mut params = self.params.clone();
        match limit {
            Some(limit) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(SqlValue::Integer(clamp(limit)));
                params.push(SqlValue::Integer(clamp(skip)));
            }
            None if skip > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(SqlValue::Integer(clamp(skip)));
            }
            None => {}
        }
        (sql, params)
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

struct Resolved {
    alias: String,
    column: &'static Column,
    join: Option<&'static Relation>,
}

struct Resolver {
    schema: &'static Schema,
}

impl Resolver {
    fn resolve(&self, path: &str) -> Result<Resolved, QueryError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut current = self.schema;
        let mut join: Option<&'static Relation> = None;

        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();
            if let Some(relation) = current.relation(segment) {
                if join.is_some() {
                    return Err(self.error(path, QueryErrorKind::JoinTooDeep));
                }
                if is_last {
                    return Err(self.error(path, QueryErrorKind::NotAColumn));
                }
                join = Some(relation);
                current = relation.target();
                continue;
            }

            match current.column(segment) {
                Some(column) if is_last => {
                    let alias = join.map_or_else(|| BASE_ALIAS.to_string(), join_alias);
                    return Ok(Resolved {
                        alias,
                        column,
                        join,
                    });
                }
                _ => return Err(self.error(path, QueryErrorKind::UnknownField)),
            }
        }

        Err(self.error(path, QueryErrorKind::UnknownField))
    }

    fn error(&self, path: &str, kind: QueryErrorKind) -> QueryError {
        let record = self.schema.record_name().to_string();
        let path = path.to_string();
        match kind {
            QueryErrorKind::UnknownField => QueryError::UnknownField { record, path },
            QueryErrorKind::NotAColumn => QueryError::NotAColumn { record, path },
            QueryErrorKind::JoinTooDeep => QueryError::JoinTooDeep { record, path },
            QueryErrorKind::NotText => QueryError::NotText { record, path },
        }
    }
}

enum QueryErrorKind {
    UnknownField,
    NotAColumn,
    JoinTooDeep,
    NotText,
}

fn join_alias(relation: &Relation) -> String {
    format!("rel_{}", relation.name)
}

fn qualified(alias: &str, column: &str) -> String {
    format!("{alias}.\"{column}\"")
}

#[derive(Default)]
struct Joins {
    relations: Vec<&'static Relation>,
}

impl Joins {
    fn add(&mut self, relation: Option<&'static Relation>) {
        if let Some(relation) = relation {
            if !self.relations.iter().any(|known| known.name == relation.name) {
                self.relations.push(relation);
            }
        }
    }

    fn render(&self) -> String {
        self.relations
            .iter()
            .map(|relation| {
                let alias = join_alias(relation);
                format!(
                    " LEFT JOIN \"{}\" AS {alias} ON {} = {}",
                    relation.target().table(),
                    qualified(&alias, ID_COLUMN),
                    qualified(BASE_ALIAS, relation.foreign_key),
                )
            })
            .collect()
    }
}

/// Builds the statements for `spec` against `schema`.
///
/// # Errors
/// - Any [`QueryError`] from path resolution or search validation.
pub fn build_query(schema: &'static Schema, spec: &QuerySpec) -> Result<BuiltQuery, QueryError> {
    let resolver = Resolver { schema };
    let mut where_joins = Joins::default();
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for (field, value) in spec.filter.iter() {
        let resolved = resolver.resolve(field)?;
        where_joins.add(resolved.join);
        let target = qualified(&resolved.alias, resolved.column.name);
        if value.is_null() {
            conditions.push(format!("{target} IS NULL"));
        } else {
            conditions.push(format!("{target} = ?"));
            params.push(value.clone());
        }
    }

    if let Some(ids) = &spec.ids {
        if ids.is_empty() {
            conditions.push("1 = 0".to_string());
        } else {
            let placeholders = vec!["?"; ids.len()].join(", ");
            conditions.push(format!(
                "{} IN ({placeholders})",
                qualified(BASE_ALIAS, ID_COLUMN)
            ));
            params.extend(ids.iter().copied().map(SqlValue::Uuid));
        }
    }

    if let Some(search) = spec.search.as_ref().filter(|search| search.is_active()) {
        let pattern = search.like_pattern();
        let mut alternatives = Vec::with_capacity(search.fields.len());
        for field in &search.fields {
            let resolved = resolver.resolve(field)?;
            if !resolved.column.kind.is_text() {
                return Err(resolver.error(field, QueryErrorKind::NotText));
            }
            where_joins.add(resolved.join);
            alternatives.push(format!(
                "{} LIKE ? ESCAPE '\\'",
                qualified(&resolved.alias, resolved.column.name)
            ));
            params.push(SqlValue::Text(pattern.clone()));
        }
        conditions.push(format!("({})", alternatives.join(" OR ")));
    }

    let mut select_joins = Joins {
        relations: where_joins.relations.clone(),
    };
    let mut order_terms = Vec::with_capacity(spec.order_by.len());
    for entry in &spec.order_by {
        let (path, direction) = match entry.strip_prefix('-') {
            Some(path) => (path, "DESC"),
            None => (entry.as_str(), "ASC"),
        };
        let resolved = resolver.resolve(path)?;
        select_joins.add(resolved.join);
        order_terms.push(format!(
            "{} {direction}",
            qualified(&resolved.alias, resolved.column.name)
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let from = format!("FROM \"{}\" AS {BASE_ALIAS}", schema.table());
    let columns = schema
        .all_columns()
        .map(|column| qualified(BASE_ALIAS, column.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut select_sql = format!(
        "SELECT {columns} {from}{}{where_clause}",
        select_joins.render()
    );
    if !order_terms.is_empty() {
        select_sql.push_str(" ORDER BY ");
        select_sql.push_str(&order_terms.join(", "));
    }

    let filtered_from = format!("{from}{}{where_clause}", where_joins.render());
    Ok(BuiltQuery {
        select_sql,
        count_sql: format!("SELECT COUNT(*) {filtered_from}"),
        exists_sql: format!("SELECT EXISTS(SELECT 1 {filtered_from})"),
        params,
    })
}
