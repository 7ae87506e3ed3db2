use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::queries;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tree_sitter::Query;

/// Grammar + compiled tag query for one language, loaded once per process.
pub struct ParserEntry {
    pub language: Language,
    pub grammar: tree_sitter::Language,
    pub query: &'static Query,
}

/// Memoized `Language -> (grammar, query)` registry.
///
/// Queries are compiled on first use and leaked so entries can be shared
/// across threads for the process lifetime. Languages without a grammar
/// (markdown, unknown extensions) yield no entry.
pub fn parser_for_extension(ext: &str) -> Result<Option<ParserEntry>> {
    let language = Language::from_extension(ext);
    parser_for_language(language)
}

pub fn parser_for_language(language: Language) -> Result<Option<ParserEntry>> {
    let Some(query_source) = queries::tags_query_source(language) else {
        return Ok(None);
    };

    static CACHE: OnceLock<Mutex<HashMap<Language, &'static Query>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let grammar = language.tree_sitter_language()?;

    let mut guard = cache.lock().expect("parser registry lock poisoned");
    let query = match guard.get(&language) {
        Some(query) => *query,
        None => {
            let compiled =
                Query::new(&grammar, query_source).map_err(|e| ChunkerError::QueryError {
                    language: language.as_str().to_string(),
                    message: e.to_string(),
                })?;
            let leaked: &'static Query = Box::leak(Box::new(compiled));
            guard.insert(language, leaked);
            leaked
        }
    };

    Ok(Some(ParserEntry {
        language,
        grammar,
        query,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_have_entries() {
        for ext in ["rs", "py", "ts", "tsx", "go", "java"] {
            let entry = parser_for_extension(ext).unwrap();
            assert!(entry.is_some(), "expected parser entry for .{ext}");
        }
    }

    #[test]
    fn markdown_and_unknown_have_no_entry() {
        assert!(parser_for_extension("md").unwrap().is_none());
        assert!(parser_for_extension("xyz").unwrap().is_none());
    }

    #[test]
    fn repeated_lookups_share_the_compiled_query() {
        let first = parser_for_extension("rs").unwrap().unwrap();
        let second = parser_for_extension("rs").unwrap().unwrap();
        assert!(std::ptr::eq(first.query, second.query));
    }
}
