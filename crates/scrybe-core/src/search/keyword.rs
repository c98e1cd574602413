//! FTS5 Query Sanitization and Keyword Search
//!
//! SQLite's FTS5 MATCH syntax treats `" ( ) * : ^ -` as operators. User
//! queries are free text, not query-language input, so every term is
//! quoted and joined with implicit `AND` before being handed to `MATCH`.

/// Sanitize a raw user query into a safe FTS5 `MATCH` expression.
///
/// Each whitespace-separated term is wrapped in double quotes (escaping any
/// embedded quote by doubling it, the FTS5 string-literal convention) and
/// the terms are joined with `AND` so a multi-word query requires all terms
/// to appear, in any order. An empty or whitespace-only query sanitizes to
/// an empty string; callers should treat that as "no results".
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| {
            let escaped = term.replace('"', "\"\"");
            format!("\"{escaped}\"")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Thin helper around FTS5 BM25-ranked keyword search. Holds no state of its
/// own; `Storage` owns the connection and calls through this for query
/// construction so the MATCH-escaping logic has one home.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordSearcher;

impl KeywordSearcher {
    pub fn new() -> Self {
        Self
    }

    /// Build the full `MATCH` clause value for a raw query, or `None` if the
    /// query sanitizes to nothing searchable.
    pub fn match_expression(&self, raw_query: &str) -> Option<String> {
        let sanitized = sanitize_fts5_query(raw_query);
        if sanitized.is_empty() {
            None
        } else {
            Some(sanitized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_simple_query() {
        assert_eq!(sanitize_fts5_query("hello world"), "\"hello\" AND \"world\"");
    }

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(sanitize_fts5_query(r#"say "hi""#), "\"say\" AND \"\"\"hi\"\"\"");
    }

    #[test]
    fn neutralizes_fts5_operators() {
        // These would otherwise be parsed as column filters / prefix / NOT.
        let sanitized = sanitize_fts5_query("title:foo* -bar");
        assert_eq!(sanitized, "\"title:foo*\" AND \"-bar\"");
    }

    #[test]
    fn empty_query_sanitizes_to_empty() {
        assert_eq!(sanitize_fts5_query("   "), "");
        assert!(KeywordSearcher::new().match_expression("   ").is_none());
    }
}
