//! Core use-case services.
//!
//! # Responsibility
//! - Expose repository operations through a storage-agnostic façade.
//! - Give consumers one seam for domain validation and side effects.

pub mod manager;

pub use manager::Manager;
