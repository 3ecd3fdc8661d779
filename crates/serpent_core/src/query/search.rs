//! Substring search over text columns.
//!
//! # Responsibility
//! - Decide whether a search request is active.
//! - Escape user text into a `LIKE` pattern.
//!
//! # Invariants
//! - `%`, `_` and `\` in user text match literally.

/// Escape character declared by every generated `LIKE ... ESCAPE` clause.
pub const LIKE_ESCAPE: char = '\\';

/// Search text plus the field paths it is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSpec {
    pub text: String,
    pub fields: Vec<String>,
}

impl SearchSpec {
    pub fn new(text: impl Into<String>, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            text: text.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Empty text or an empty field list disables search. Whitespace is
    /// searched like any other text.
    pub fn is_active(&self) -> bool {
        !self.text.is_empty() && !self.fields.is_empty()
    }

    /// Returns the `%text%` pattern bound for every search condition.
    pub fn like_pattern(&self) -> String {
        format!("%{}%", escape_like(&self.text))
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{escape_like, SearchSpec};

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn empty_text_or_no_fields_disables_search() {
        assert!(!SearchSpec::new("", ["title"]).is_active());
        assert!(SearchSpec::new("   ", ["title"]).is_active());
        assert!(!SearchSpec::new("milk", Vec::<String>::new()).is_active());
        assert!(SearchSpec::new("milk", ["title"]).is_active());
    }

    #[test]
    fn like_pattern_wraps_text() {
        assert_eq!(SearchSpec::new("a_b", ["title"]).like_pattern(), "%a\\_b%");
    }
}
