//! Tree-sitter based parse adapter.
//!
//! Turns source text into the nested parse form ([`RawNode`]) consumed by the
//! normalizer, or a located [`ParseError`]. Grammars are compiled once per
//! process and shared through [`GrammarCache`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde_json::Value;
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

use crate::ast_engine::languages::{resolve_selector, tree_sitter_language, GrammarSpec};
use crate::error::{ParseError, RuleLoadError};
use crate::tree::{NodeValue, RawNode};
use crate::types::Location;

/// A compiled grammar: its static tables plus the tree-sitter language.
pub struct Grammar {
    spec: &'static GrammarSpec,
    language: Language,
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar").field("name", &self.spec.name).finish()
    }
}

impl Grammar {
    fn compile(spec: &'static GrammarSpec) -> Result<Self, String> {
        let language = tree_sitter_language(spec.name)
            .ok_or_else(|| format!("no tree-sitter language for {}", spec.name))?;

        // Reject ABI mismatches once, up front
        let mut parser = Parser::new();
        parser.set_language(&language).map_err(|e| e.to_string())?;

        Ok(Self { spec, language })
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn spec(&self) -> &'static GrammarSpec {
        self.spec
    }

    /// Canonical name for a raw node kind.
    pub fn alias<'a>(&self, kind: &'a str) -> &'a str {
        self.spec
            .aliases
            .iter()
            .find(|(raw, _)| *raw == kind)
            .map_or(kind, |(_, canonical)| canonical)
    }

    pub fn is_leaf(&self, raw_kind: &str) -> bool {
        self.spec.leaf_kinds.contains(&raw_kind)
    }

    pub fn is_comment(&self, kind: &str) -> bool {
        self.spec.comment_kinds.contains(&kind)
    }

    /// Whether `kind` is dropped when it appears under `parent`.
    pub fn is_stripped(&self, kind: &str, parent: &str) -> bool {
        self.spec.strip_kinds.contains(&kind) && !self.spec.strip_exempt.contains(&parent)
    }

    /// Parse source text into the raw parse form.
    pub fn parse(&self, source: &str, file: &str) -> Result<RawNode, ParseError> {
        // Parser is not thread-safe, so each parse gets its own
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ParseError::new(file, Location::default(), e.to_string()))?;

        let tree = parser
            .parse(source.as_bytes(), None)
            .ok_or_else(|| ParseError::new(file, Location::default(), "parser produced no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            if let Some(bad) = first_error(root) {
                let message = if bad.is_missing() {
                    format!("missing `{}`", bad.kind())
                } else {
                    "unexpected input".to_string()
                };
                return Err(ParseError::new(file, location_of(&bad), message));
            }
        }

        Ok(self.convert(root, source.as_bytes()))
    }

    fn convert(&self, node: Node<'_>, source: &[u8]) -> RawNode {
        let kind = node.kind();

        if self.is_leaf(kind) {
            let text = node.utf8_text(source).unwrap_or_default();
            return RawNode::leaf(kind, leaf_value(kind, text)).at(location_of(&node));
        }

        let mut raw = RawNode::new(kind).at(location_of(&node));
        let operator = node.child_by_field_name("operator").filter(|op| !op.is_named());
        let record_fields = self.spec.field_kinds.contains(&kind);
        let mut keywords = Vec::new();
        let mut fields = Vec::new();

        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            let mut index = 0;
            loop {
                let child = cursor.node();
                if child.is_named() {
                    if record_fields {
                        fields.push(cursor.field_name().map_or(Value::Null, Value::from));
                    }
                    raw.nodes.push(self.convert(child, source));
                } else {
                    let token = child.kind();
                    if operator.map_or(false, |op| op.id() == child.id()) {
                        raw.attrs.insert("operator".to_string(), Value::from(token));
                        if index == 0 {
                            raw.attrs.insert("prefix".to_string(), Value::Bool(true));
                        }
                    } else {
                        // Some grammars fuse keywords into one token (`static get`)
                        keywords.extend(token.split_whitespace().filter(|w| is_keyword(w)).map(Value::from));
                    }
                }

                index += 1;
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }

        if record_fields {
            raw.attrs.insert("fields".to_string(), Value::Array(fields));
        }
        if !keywords.is_empty() {
            raw.attrs.insert("keywords".to_string(), Value::Array(keywords));
        }

        raw
    }
}

/// Alphabetic tokens, plus the `*` of generators and namespace imports.
fn is_keyword(token: &str) -> bool {
    token == "*" || (!token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Leaf payload for a captured token.
fn leaf_value(kind: &str, text: &str) -> NodeValue {
    match kind {
        "true" => NodeValue::Bool(true),
        "false" => NodeValue::Bool(false),
        "number" => match text.parse::<f64>() {
            Ok(n) if n.is_finite() => NodeValue::Number(n),
            _ => NodeValue::Text(text.to_string()),
        },
        _ => NodeValue::Text(text.to_string()),
    }
}

fn location_of(node: &Node<'_>) -> Location {
    let pos = node.start_position();
    Location::new(pos.row + 1, pos.column, node.start_byte())
}

/// First ERROR or MISSING node in document order.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

type GrammarSlot = Arc<OnceLock<Result<Arc<Grammar>, String>>>;

/// Process-wide grammar cache keyed by grammar name.
///
/// Concurrent first use of the same grammar blocks on a single compile and
/// every caller receives the same shared instance.
#[derive(Default)]
pub struct GrammarCache {
    entries: Mutex<HashMap<&'static str, GrammarSlot>>,
    compiles: AtomicUsize,
}

impl GrammarCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide cache.
    pub fn global() -> &'static GrammarCache {
        lazy_static::lazy_static! {
            static ref GLOBAL: GrammarCache = GrammarCache::new();
        }
        &GLOBAL
    }

    /// Load a grammar by name or file path, compiling it on first use.
    pub fn load(&self, selector: &str) -> Result<Arc<Grammar>, RuleLoadError> {
        let spec = resolve_selector(selector)
            .ok_or_else(|| RuleLoadError::UnknownGrammar(selector.to_string()))?;

        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(spec.name).or_default())
        };

        let compiled = slot.get_or_init(|| {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            debug!(grammar = spec.name, "Compiling grammar");
            Grammar::compile(spec).map(Arc::new)
        });

        compiled.clone().map_err(|reason| RuleLoadError::GrammarLoad {
            name: spec.name.to_string(),
            reason,
        })
    }

    /// Number of grammar compilations performed by this cache.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}
