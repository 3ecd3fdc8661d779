//! Record model: storage values, per-type schemas and the `Record` contract.
//!
//! # Responsibility
//! - Describe record types explicitly (table, typed columns, relations).
//! - Convert between Rust field values and SQLite storage values.
//!
//! # Invariants
//! - Every record carries `id`, `created_on` and `updated_on` meta columns.
//! - `updated_on >= created_on` for every stamped record.

pub mod record;
pub mod schema;
pub mod value;
