//! Explicit per-record-type schema descriptions.
//!
//! # Responsibility
//! - Name the backing table and the typed, queryable columns of one record
//!   type.
//! - Declare many-to-one relationships used by relationship ordering.
//!
//! # Invariants
//! - Column and relation names are unique within one schema.
//! - `id`, `created_on` and `updated_on` are implicit and reserved.
//! - A relation's foreign key names a declared `Uuid` column.

use crate::util::strings::title_to_snake;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub const ID_COLUMN: &str = "id";
pub const CREATED_ON_COLUMN: &str = "created_on";
pub const UPDATED_ON_COLUMN: &str = "updated_on";

/// Declared value kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Boolean,
    Uuid,
    Timestamp,
}

impl ColumnKind {
    /// Text-typed columns are the only valid search targets.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

static META_COLUMNS: [Column; 3] = [
    Column {
        name: ID_COLUMN,
        kind: ColumnKind::Uuid,
        nullable: false,
    },
    Column {
        name: CREATED_ON_COLUMN,
        kind: ColumnKind::Timestamp,
        nullable: false,
    },
    Column {
        name: UPDATED_ON_COLUMN,
        kind: ColumnKind::Timestamp,
        nullable: false,
    },
];

/// Many-to-one link from this record type to another.
#[derive(Clone, Copy)]
pub struct Relation {
    pub name: &'static str,
    pub foreign_key: &'static str,
    target: fn() -> &'static Schema,
}

impl Relation {
    pub fn target(&self) -> &'static Schema {
        (self.target)()
    }
}

impl Debug for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("foreign_key", &self.foreign_key)
            .finish_non_exhaustive()
    }
}

/// Schema rule violation found by [`Schema::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyTable { record: String },
    ReservedName { record: String, name: String },
    DuplicateName { record: String, name: String },
    BadForeignKey {
        record: String,
        relation: String,
        foreign_key: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTable { record } => write!(f, "'{record}' has an empty table name"),
            Self::ReservedName { record, name } => {
                write!(f, "'{record}' redeclares reserved column '{name}'")
            }
            Self::DuplicateName { record, name } => {
                write!(f, "'{record}' declares '{name}' more than once")
            }
            Self::BadForeignKey {
                record,
                relation,
                foreign_key,
            } => write!(
                f,
                "'{record}' relation '{relation}' needs uuid column '{foreign_key}'"
            ),
        }
    }
}

impl Error for SchemaError {}

/// Table, columns and relations for one record type.
#[derive(Debug, Clone)]
pub struct Schema {
    record_name: &'static str,
    table: String,
    columns: Vec<Column>,
    relations: Vec<Relation>,
}

impl Schema {
    /// Starts a schema for `record_name`; the table defaults to its
    /// snake_case form.
    pub fn builder(record_name: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                record_name,
                table: title_to_snake(record_name),
                columns: Vec::new(),
                relations: Vec::new(),
            },
        }
    }

    pub fn record_name(&self) -> &'static str {
        self.record_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared data columns, without the meta columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Meta columns followed by declared columns, in select order.
    pub fn all_columns(&self) -> impl Iterator<Item = &Column> {
        META_COLUMNS.iter().chain(self.columns.iter())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.all_columns().find(|column| column.name == name)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let record = self.record_name.to_string();
        if self.table.trim().is_empty() {
            return Err(SchemaError::EmptyTable { record });
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if META_COLUMNS.iter().any(|meta| meta.name == column.name) {
                return Err(SchemaError::ReservedName {
                    record,
                    name: column.name.to_string(),
                });
            }
            if !seen.insert(column.name) {
                return Err(SchemaError::DuplicateName {
                    record,
                    name: column.name.to_string(),
                });
            }
        }

        for relation in &self.relations {
            if !seen.insert(relation.name) {
                return Err(SchemaError::DuplicateName {
                    record,
                    name: relation.name.to_string(),
                });
            }
            let fk_ok = self
                .columns
                .iter()
                .any(|column| column.name == relation.foreign_key && column.kind == ColumnKind::Uuid);
            if !fk_ok {
                return Err(SchemaError::BadForeignKey {
                    record,
                    relation: relation.name.to_string(),
                    foreign_key: relation.foreign_key.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Fluent constructor returned by [`Schema::builder`].
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.schema.table = table.into();
        self
    }

    pub fn column(self, name: &'static str, kind: ColumnKind) -> Self {
        self.push_column(name, kind, false)
    }

    pub fn nullable_column(self, name: &'static str, kind: ColumnKind) -> Self {
        self.push_column(name, kind, true)
    }

    /// Declares a many-to-one relation through `foreign_key`.
    pub fn belongs_to(
        mut self,
        name: &'static str,
        foreign_key: &'static str,
        target: fn() -> &'static Schema,
    ) -> Self {
        self.schema.relations.push(Relation {
            name,
            foreign_key,
            target,
        });
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }

    fn push_column(mut self, name: &'static str, kind: ColumnKind, nullable: bool) -> Self {
        self.schema.columns.push(Column {
            name,
            kind,
            nullable,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnKind, Schema, SchemaError};
    use once_cell::sync::Lazy;

    static OWNER: Lazy<Schema> = Lazy::new(|| {
        Schema::builder("Owner")
            .column("name", ColumnKind::Text)
            .build()
    });

    fn owner() -> &'static Schema {
        &OWNER
    }

    #[test]
    fn table_name_defaults_to_snake_case() {
        let schema = Schema::builder("ShoppingListItem").build();
        assert_eq!(schema.table(), "shopping_list_item");

        let schema = Schema::builder("ShoppingListItem").table("items").build();
        assert_eq!(schema.table(), "items");
    }

    #[test]
    fn all_columns_lead_with_meta_columns() {
        let schema = Schema::builder("Task")
            .column("title", ColumnKind::Text)
            .build();
        let names: Vec<_> = schema.all_columns().map(|c| c.name).collect();
        assert_eq!(names, vec!["id", "created_on", "updated_on", "title"]);
    }

    #[test]
    fn validate_accepts_relation_with_uuid_foreign_key() {
        let schema = Schema::builder("Pet")
            .column("owner_id", ColumnKind::Uuid)
            .belongs_to("owner", "owner_id", owner)
            .build();
        assert_eq!(schema.validate(), Ok(()));
        assert_eq!(schema.relation("owner").unwrap().target().table(), "owner");
    }

    #[test]
    fn validate_rejects_reserved_and_duplicate_names() {
        let schema = Schema::builder("Pet")
            .column("id", ColumnKind::Uuid)
            .build();
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::ReservedName { .. })
        ));

        let schema = Schema::builder("Pet")
            .column("name", ColumnKind::Text)
            .column("name", ColumnKind::Text)
            .build();
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::DuplicateName { .. })
        ));
    }

    #[test]
    fn validate_rejects_non_uuid_foreign_key() {
        let schema = Schema::builder("Pet")
            .column("owner_id", ColumnKind::Text)
            .belongs_to("owner", "owner_id", owner)
            .build();
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::BadForeignKey { .. })
        ));
    }
}
