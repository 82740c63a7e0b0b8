//! Structural comparison of subtrees, possibly across trees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lazy_static::lazy_static;
use serde_json::Value;
use tracing::debug;

use super::arena::Tree;
use super::node::{NodeId, NodeValue};
use super::normalize::Normalizer;
use super::{GRAMMAR_ITEM, WILDCARD};
use crate::ast_engine::GrammarCache;

lazy_static! {
    /// Parsed snippet patterns keyed by (grammar, snippet). `None` marks
    /// snippets that do not parse to a single node.
    static ref PATTERNS: Mutex<HashMap<(String, String), Option<Arc<Tree>>>> = Mutex::new(HashMap::new());
}

/// One-directional subset match: everything present in `pattern` must match
/// `node`. Children are matched by position and a `$_` node in the pattern
/// matches any subtree.
pub fn like(tree: &Tree, node: NodeId, pattern_tree: &Tree, pattern: NodeId) -> bool {
    let p = pattern_tree.node(pattern);
    if matches!(p.value(), Some(NodeValue::Text(text)) if text == WILDCARD) {
        return true;
    }

    let n = tree.node(node);
    if n.kind() != p.kind() {
        return false;
    }
    if p.value().is_some() && n.value() != p.value() {
        return false;
    }
    let attrs_match = p
        .attrs()
        .iter()
        .all(|(key, expected)| n.attr(key).map_or(false, |actual| json_like(actual, expected)));
    if !attrs_match || n.children().len() < p.children().len() {
        return false;
    }

    p.children()
        .iter()
        .zip(n.children())
        .all(|(&pc, &nc)| like(tree, nc, pattern_tree, pc))
}

fn json_like(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(key, ev)| a.get(key).map_or(false, |av| json_like(av, ev))),
        (Value::Array(a), Value::Array(e)) => {
            a.len() >= e.len() && e.iter().zip(a).all(|(ev, av)| json_like(av, ev))
        }
        _ => actual == expected,
    }
}

/// Exact two-directional match of type, value, attributes and children.
/// Locations and scoped items are ignored.
pub fn equal(tree: &Tree, node: NodeId, other_tree: &Tree, other: NodeId) -> bool {
    let a = tree.node(node);
    let b = other_tree.node(other);

    a.kind() == b.kind()
        && a.value() == b.value()
        && a.attrs() == b.attrs()
        && a.children().len() == b.children().len()
        && a
            .children()
            .iter()
            .zip(b.children())
            .all(|(&ac, &bc)| equal(tree, ac, other_tree, bc))
}

/// Match a node against a code snippet parsed with the grammar of the
/// enclosing file.
///
/// Returns false when no grammar is in scope or the snippet does not parse
/// to a single top-level node.
pub fn like_source(tree: &Tree, node: NodeId, snippet: &str) -> bool {
    let Some(grammar) = tree.item(node, GRAMMAR_ITEM).and_then(Value::as_str) else {
        return false;
    };
    let Some(pattern) = pattern_for(grammar, snippet) else {
        return false;
    };

    let top = pattern.children(pattern.root())[0];
    if like(tree, node, &pattern, top) {
        return true;
    }
    match pattern.children(top) {
        [inner] => like(tree, node, &pattern, *inner),
        _ => false,
    }
}

fn pattern_for(grammar: &str, snippet: &str) -> Option<Arc<Tree>> {
    let key = (grammar.to_string(), snippet.to_string());
    if let Some(cached) = PATTERNS.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
        return cached.clone();
    }

    let compiled = compile_pattern(grammar, snippet);
    PATTERNS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, compiled.clone());
    compiled
}

fn compile_pattern(grammar: &str, snippet: &str) -> Option<Arc<Tree>> {
    let grammar = GrammarCache::global().load(grammar).ok()?;
    let raw = match grammar.parse(snippet, "<pattern>") {
        Ok(raw) => raw,
        Err(e) => {
            debug!(snippet, error = %e, "Pattern does not parse");
            return None;
        }
    };

    let tree = Tree::from_raw(Normalizer::new(grammar).normalize(raw));
    if tree.children(tree.root()).len() != 1 {
        debug!(snippet, "Pattern is not a single node");
        return None;
    }
    Some(Arc::new(tree))
}
