//! `Record` contract and row decoding.
//!
//! # Responsibility
//! - Define what a persistable record type must provide.
//! - Stamp identity and timestamps on create and update.
//! - Hand decoded rows to record constructors with typed getters.
//!
//! # Invariants
//! - Caller-supplied ids must be UUID version 4.
//! - `updated_on` is never earlier than `created_on`.

use super::schema::{Schema, CREATED_ON_COLUMN, ID_COLUMN, UPDATED_ON_COLUMN};
use super::value::{FromSqlValue, RecordError, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RecordId = Uuid;

/// Identity and timestamps shared by every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub id: Option<RecordId>,
    pub created_on: Option<DateTime<Utc>>,
    pub updated_on: Option<DateTime<Utc>>,
}

impl RecordMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: RecordId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Rejects caller-supplied ids that are not UUID v4.
    pub fn validate_id(&self) -> Result<(), RecordError> {
        match self.id {
            Some(id) if id.get_version_num() != 4 => Err(RecordError::InvalidId(id)),
            _ => Ok(()),
        }
    }

    /// Assigns a fresh id when absent and sets both timestamps to `now`.
    pub fn stamp_created(&mut self, now: DateTime<Utc>) -> RecordId {
        let id = *self.id.get_or_insert_with(Uuid::new_v4);
        self.created_on = Some(now);
        self.updated_on = Some(now);
        id
    }

    /// Keeps the stored creation time and moves `updated_on` forward.
    pub fn stamp_updated(&mut self, stored_created_on: DateTime<Utc>, now: DateTime<Utc>) {
        self.created_on = Some(stored_created_on);
        self.updated_on = Some(now.max(stored_created_on));
    }
}

/// A persistable record type.
///
/// Implementors describe their table once through [`Record::schema`] and
/// convert to and from column values.
pub trait Record: Clone + Send + Sync + 'static {
    fn schema() -> &'static Schema;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Declared data columns and their current values, meta excluded.
    fn values(&self) -> Vec<(&'static str, SqlValue)>;

    /// Builds a record from a decoded row. `row.meta()` carries the meta
    /// columns.
    fn from_row(row: &ValueRow) -> Result<Self, RecordError>;

    fn id(&self) -> Option<RecordId> {
        self.meta().id
    }
}

/// One decoded result row, addressable by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRow {
    cells: Vec<(&'static str, SqlValue)>,
}

impl ValueRow {
    /// Decodes raw storage values laid out in `schema.all_columns()` order.
    pub fn decode(schema: &Schema, raw: Vec<SqlValue>) -> Result<Self, RecordError> {
        let mut cells = Vec::with_capacity(raw.len());
        let mut raw = raw.into_iter();
        for column in schema.all_columns() {
            let value = raw
                .next()
                .ok_or_else(|| RecordError::MissingColumn(column.name.to_string()))?;
            cells.push((column.name, SqlValue::decode(column.name, column.kind, value)?));
        }
        Ok(Self { cells })
    }

    pub fn from_cells(cells: Vec<(&'static str, SqlValue)>) -> Self {
        Self { cells }
    }

    pub fn value(&self, column: &str) -> Result<&SqlValue, RecordError> {
        self.cells
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| RecordError::MissingColumn(column.to_string()))
    }

    pub fn get<T: FromSqlValue>(&self, column: &str) -> Result<T, RecordError> {
        T::from_sql_value(column, self.value(column)?)
    }

    pub fn meta(&self) -> Result<RecordMeta, RecordError> {
        Ok(RecordMeta {
            id: self.get(ID_COLUMN)?,
            created_on: self.get(CREATED_ON_COLUMN)?,
            updated_on: self.get(UPDATED_ON_COLUMN)?,
        })
    }
}
