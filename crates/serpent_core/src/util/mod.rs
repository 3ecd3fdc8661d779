//! Small string and datetime helpers shared across core modules.

pub mod strings;
pub mod time;
