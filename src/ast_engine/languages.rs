//! Grammar tables for the supported tree-sitter languages.
//!
//! Each grammar declares which node kinds are leaves (their source text becomes
//! the node value), which are comments, which are dropped, and how raw kinds
//! are aliased to canonical ones.

use std::path::Path;

use tree_sitter::Language;

/// Static description of a grammar.
#[derive(Debug)]
pub struct GrammarSpec {
    /// Grammar name used as selector and cache key.
    pub name: &'static str,
    /// File extensions handled by this grammar.
    pub extensions: &'static [&'static str],
    /// Raw kind → canonical kind.
    pub aliases: &'static [(&'static str, &'static str)],
    /// Raw kinds whose text is captured instead of descending.
    pub leaf_kinds: &'static [&'static str],
    /// Canonical kinds extracted as comments.
    pub comment_kinds: &'static [&'static str],
    /// Canonical kinds dropped during normalization.
    pub strip_kinds: &'static [&'static str],
    /// Parents whose children are positional, so nothing is stripped there.
    pub strip_exempt: &'static [&'static str],
    /// Kinds whose children's field names are recorded in a `fields` attribute.
    pub field_kinds: &'static [&'static str],
}

const JS_ALIASES: &[(&str, &str)] = &[
    ("function", "function_expression"),
    ("property_identifier", "identifier"),
    ("shorthand_property_identifier", "identifier"),
    ("shorthand_property_identifier_pattern", "identifier"),
    ("statement_identifier", "identifier"),
    ("private_property_identifier", "identifier"),
];

const JS_LEAVES: &[&str] = &[
    "identifier",
    "property_identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
    "statement_identifier",
    "private_property_identifier",
    "number",
    "string",
    "template_string",
    "regex",
    "true",
    "false",
    "null",
    "undefined",
    "this",
    "super",
    "import",
    "optional_chain",
    "comment",
    "html_comment",
    "hash_bang_line",
    "jsx_text",
    "html_character_reference",
    "glimmer_template",
];

const TS_LEAVES: &[&str] = &[
    "identifier",
    "property_identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
    "statement_identifier",
    "private_property_identifier",
    "type_identifier",
    "predefined_type",
    "number",
    "string",
    "template_string",
    "regex",
    "true",
    "false",
    "null",
    "undefined",
    "this",
    "super",
    "import",
    "optional_chain",
    "comment",
    "html_comment",
    "hash_bang_line",
    "jsx_text",
    "html_character_reference",
];

const COMMENTS: &[&str] = &["comment", "html_comment"];

const EMPTY_STATEMENTS: &[&str] = &["empty_statement"];

const FOR_HEADERS: &[&str] = &["for_statement"];

static JAVASCRIPT: GrammarSpec = GrammarSpec {
    name: "javascript",
    extensions: &["js", "mjs", "cjs", "jsx"],
    aliases: JS_ALIASES,
    leaf_kinds: JS_LEAVES,
    comment_kinds: COMMENTS,
    strip_kinds: EMPTY_STATEMENTS,
    strip_exempt: FOR_HEADERS,
    field_kinds: FOR_HEADERS,
};

static TYPESCRIPT: GrammarSpec = GrammarSpec {
    name: "typescript",
    extensions: &["ts", "mts", "cts"],
    aliases: JS_ALIASES,
    leaf_kinds: TS_LEAVES,
    comment_kinds: COMMENTS,
    strip_kinds: EMPTY_STATEMENTS,
    strip_exempt: FOR_HEADERS,
    field_kinds: FOR_HEADERS,
};

static TSX: GrammarSpec = GrammarSpec {
    name: "tsx",
    extensions: &["tsx"],
    aliases: JS_ALIASES,
    leaf_kinds: TS_LEAVES,
    comment_kinds: COMMENTS,
    strip_kinds: EMPTY_STATEMENTS,
    strip_exempt: FOR_HEADERS,
    field_kinds: FOR_HEADERS,
};

static GRAMMARS: [&GrammarSpec; 3] = [&JAVASCRIPT, &TYPESCRIPT, &TSX];

/// Get the spec for a grammar name.
pub fn get_grammar_spec(name: &str) -> Option<&'static GrammarSpec> {
    let name = match name {
        "js" | "jsx" | "ecmascript" => "javascript",
        "ts" => "typescript",
        other => other,
    };
    GRAMMARS.iter().copied().find(|spec| spec.name == name)
}

/// Infer the grammar for a file path from its extension.
pub fn grammar_for_path(path: &str) -> Option<&'static GrammarSpec> {
    let ext = Path::new(path).extension()?.to_str()?;
    GRAMMARS
        .iter()
        .copied()
        .find(|spec| spec.extensions.contains(&ext))
}

/// Resolve a selector that is either a grammar name or a file path.
pub fn resolve_selector(selector: &str) -> Option<&'static GrammarSpec> {
    get_grammar_spec(selector).or_else(|| grammar_for_path(selector))
}

/// Get the tree-sitter language for a grammar name.
pub(crate) fn tree_sitter_language(name: &str) -> Option<Language> {
    match name {
        "javascript" => Some(tree_sitter_javascript::language()),
        "typescript" => Some(tree_sitter_typescript::language_typescript()),
        "tsx" => Some(tree_sitter_typescript::language_tsx()),
        _ => None,
    }
}

/// Names of all supported grammars.
pub fn supported_grammars() -> Vec<&'static str> {
    GRAMMARS.iter().map(|spec| spec.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_javascript_spec() {
        let spec = get_grammar_spec("javascript").unwrap();
        assert!(spec.leaf_kinds.contains(&"identifier"));
        assert!(spec.comment_kinds.contains(&"comment"));
        assert!(spec.aliases.contains(&("function", "function_expression")));
    }

    #[test]
    fn test_selector_aliases() {
        assert_eq!(get_grammar_spec("js").unwrap().name, "javascript");
        assert_eq!(get_grammar_spec("ts").unwrap().name, "typescript");
    }

    #[test]
    fn test_grammar_for_path() {
        assert_eq!(grammar_for_path("lib/index.js").unwrap().name, "javascript");
        assert_eq!(grammar_for_path("src/app.tsx").unwrap().name, "tsx");
        assert_eq!(grammar_for_path("types.mts").unwrap().name, "typescript");
        assert!(grammar_for_path("README.md").is_none());
        assert!(grammar_for_path("Makefile").is_none());
    }

    #[test]
    fn test_resolve_selector_prefers_name() {
        assert_eq!(resolve_selector("tsx").unwrap().name, "tsx");
        assert_eq!(resolve_selector("a/b.cjs").unwrap().name, "javascript");
        assert!(resolve_selector("cobol").is_none());
    }

    #[test]
    fn test_every_grammar_has_language() {
        for name in supported_grammars() {
            assert!(tree_sitter_language(name).is_some(), "missing language for {}", name);
        }
    }
}
