//! Identifier case conversion.
//!
//! # Responsibility
//! - Convert between `snake_case`, `camelCase` and `PascalCase` names.
//! - Derive default table names from record type names.
//!
//! # Invariants
//! - Empty input always maps to empty output.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static UPPERCASE: Lazy<Regex> = Lazy::new(|| Regex::new("[A-Z]").expect("static regex"));

/// `"foo_bar"` -> `"FooBar"`.
pub fn snake_to_pascal(value: &str) -> String {
    value.split('_').map(capitalize).collect()
}

/// Alias of [`snake_to_pascal`].
pub fn snake_to_title(value: &str) -> String {
    snake_to_pascal(value)
}

/// `"foo_bar"` -> `"fooBar"`.
pub fn snake_to_camel(value: &str) -> String {
    value
        .split('_')
        .enumerate()
        .map(|(index, word)| {
            if index == 0 {
                word.to_lowercase()
            } else {
                capitalize(word)
            }
        })
        .collect()
}

/// `"FooBar"` -> `"foo_bar"`.
///
/// Every uppercase letter except a leading one starts a new word, so
/// acronyms split per letter (`"HTTPServer"` -> `"h_t_t_p_server"`).
pub fn title_to_snake(value: &str) -> String {
    UPPERCASE
        .replace_all(value, |caps: &Captures<'_>| {
            let matched = &caps[0];
            match caps.get(0).map(|m| m.start()) {
                Some(0) | None => matched.to_string(),
                Some(_) => format!("_{matched}"),
            }
        })
        .to_lowercase()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
