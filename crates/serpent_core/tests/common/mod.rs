#![allow(dead_code)]

use once_cell::sync::Lazy;
use serpent_core::db::migrations::Migration;
use serpent_core::{ColumnKind, Record, RecordError, RecordMeta, Schema, SqlValue, ValueRow};
use uuid::Uuid;

pub static MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "CREATE TABLE author (
            id TEXT PRIMARY KEY NOT NULL,
            created_on TEXT NOT NULL,
            updated_on TEXT NOT NULL,
            name TEXT NOT NULL,
            active INTEGER NOT NULL
        );",
    ),
    Migration::new(
        2,
        "CREATE TABLE book (
            id TEXT PRIMARY KEY NOT NULL,
            created_on TEXT NOT NULL,
            updated_on TEXT NOT NULL,
            title TEXT NOT NULL,
            pages INTEGER NOT NULL,
            rating REAL,
            author_id TEXT REFERENCES author(id)
        );",
    ),
];

static AUTHOR_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::builder("Author")
        .column("name", ColumnKind::Text)
        .column("active", ColumnKind::Boolean)
        .build()
});

static BOOK_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::builder("Book")
        .column("title", ColumnKind::Text)
        .column("pages", ColumnKind::Integer)
        .nullable_column("rating", ColumnKind::Real)
        .nullable_column("author_id", ColumnKind::Uuid)
        .belongs_to("author", "author_id", author_schema)
        .build()
});

fn author_schema() -> &'static Schema {
    &AUTHOR_SCHEMA
}

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub meta: RecordMeta,
    pub name: String,
    pub active: bool,
}

impl Author {
    pub fn new(name: &str) -> Self {
        Self {
            meta: RecordMeta::new(),
            name: name.to_string(),
            active: true,
        }
    }
}

impl Record for Author {
    fn schema() -> &'static Schema {
        &AUTHOR_SCHEMA
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("name", self.name.clone().into()),
            ("active", self.active.into()),
        ]
    }

    fn from_row(row: &ValueRow) -> Result<Self, RecordError> {
        Ok(Self {
            meta: row.meta()?,
            name: row.get("name")?,
            active: row.get("active")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub meta: RecordMeta,
    pub title: String,
    pub pages: i64,
    pub rating: Option<f64>,
    pub author_id: Option<Uuid>,
}

impl Book {
    pub fn new(title: &str, pages: i64) -> Self {
        Self {
            meta: RecordMeta::new(),
            title: title.to_string(),
            pages,
            rating: None,
            author_id: None,
        }
    }

    pub fn by(mut self, author: &Author) -> Self {
        self.author_id = author.meta.id;
        self
    }
}

impl Record for Book {
    fn schema() -> &'static Schema {
        &BOOK_SCHEMA
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("title", self.title.clone().into()),
            ("pages", self.pages.into()),
            ("rating", self.rating.into()),
            ("author_id", self.author_id.into()),
        ]
    }

    fn from_row(row: &ValueRow) -> Result<Self, RecordError> {
        Ok(Self {
            meta: row.meta()?,
            title: row.get("title")?,
            pages: row.get("pages")?,
            rating: row.get("rating")?,
            author_id: row.get("author_id")?,
        })
    }
}

/// Titles in `books`, sorted.
pub fn sorted_titles(books: &[Book]) -> Vec<String> {
    let mut titles: Vec<String> = books.iter().map(|book| book.title.clone()).collect();
    titles.sort();
    titles
}
