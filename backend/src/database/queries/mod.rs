//! Database query functions (Data Access Objects).
//!
//! This module centralizes all direct database operations, providing reusable
//! functions for interacting with the database and abstracting the query logic from
//! higher-level services and API handlers. Every function is synchronous and takes a
//! borrowed connection (or transaction); async callers go through `Database::call`.

pub mod audit;
pub mod claims;
pub mod directory;
pub mod feedback;
pub mod media;
pub mod property;
pub mod publications;
pub mod settings;
pub mod users;

/// `%term%` for a `LIKE ... ESCAPE '\'` clause, with wildcards in `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Lower-cased search term, `None` when blank. Compare it against `fold_case(column)`.
pub(crate) fn search_term(q: Option<&str>) -> Option<String> {
    q.map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| like_pattern(&q.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(search_term(Some("  ")), None);
        assert_eq!(search_term(Some("Lift")), Some("%lift%".to_string()));
    }
}
