//! Declarative read-query construction.
//!
//! # Responsibility
//! - Turn filter, search and order specifications into parameterized SQL.
//! - Compute page numbers for paginated results.
//!
//! # Invariants
//! - User input only ever reaches SQL as bind parameters.
//! - Field paths cross at most one relationship.

pub mod builder;
pub mod page;
pub mod search;

pub use builder::{build_query, BuiltQuery, Filter, QueryError, QuerySpec};
pub use page::{page_numbers, PaginatedList};
pub use search::SearchSpec;
