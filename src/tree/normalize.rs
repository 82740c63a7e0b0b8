//! Raw parse form → canonical node tree.

use std::sync::Arc;

use serde_json::Value;

use super::arena::Tree;
use super::node::{NodeValue, RawNode};
use super::{CORPUS_KIND, FILE_ITEM, GRAMMAR_ITEM};
use crate::ast_engine::Grammar;
use crate::error::TreeError;
use crate::types::PackageInfo;

/// Applies a grammar's aliasing, grouping, stripping and comment rules.
#[derive(Debug, Clone)]
pub struct Normalizer {
    grammar: Arc<Grammar>,
}

impl Normalizer {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Normalize a raw subtree.
    pub fn normalize(&self, mut raw: RawNode) -> RawNode {
        raw.kind = self.grammar.alias(&raw.kind).to_string();
        raw.nodes = self.normalize_children(&raw.kind, std::mem::take(&mut raw.nodes));
        raw
    }

    fn normalize_children(&self, parent: &str, nodes: Vec<RawNode>) -> Vec<RawNode> {
        let mut out = Vec::with_capacity(nodes.len());
        let mut comments: Vec<RawNode> = Vec::new();

        for child in nodes {
            if child.is_group() {
                // Groups splice in place; comments may carry across them
                for inner in self.normalize_children(parent, child.nodes) {
                    self.push_child(parent, &mut out, &mut comments, inner);
                }
                continue;
            }
            let child = self.normalize(child);
            self.push_child(parent, &mut out, &mut comments, child);
        }

        // Nothing follows: keep trailing comments as leaves
        out.extend(comments);
        out
    }

    fn push_child(&self, parent: &str, out: &mut Vec<RawNode>, comments: &mut Vec<RawNode>, mut child: RawNode) {
        if self.grammar.is_stripped(&child.kind, parent) {
            return;
        }
        if self.grammar.is_comment(&child.kind) && child.nodes.is_empty() {
            comments.push(child);
            return;
        }

        if !comments.is_empty() {
            let mut texts: Vec<Value> = comments
                .drain(..)
                .filter_map(|comment| match comment.value {
                    Some(NodeValue::Text(text)) => Some(Value::String(text)),
                    _ => None,
                })
                .collect();
            if let Some(Value::Array(existing)) = child.attrs.remove("comments") {
                texts.extend(existing);
            }
            child.attrs.insert("comments".to_string(), Value::Array(texts));
        }
        out.push(child);
    }

    /// Normalize a file's parse and build a standalone tree whose root carries
    /// the `file` and `grammar` scoped items.
    pub fn tree(&self, raw: RawNode, file: &str) -> Tree {
        let mut tree = Tree::from_raw(self.normalize(raw));
        let root = tree.root();
        tree.set_item(root, FILE_ITEM, file);
        tree.set_item(root, GRAMMAR_ITEM, self.grammar.name());
        tree
    }
}

/// One normalized file ready to join the corpus.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub path: String,
    pub grammar: String,
    pub package: Option<PackageInfo>,
    pub program: RawNode,
}

/// Place every file under one synthetic `corpus` root.
///
/// Each file root gets the `path` attribute (and `package` when known) plus
/// the `file` and `grammar` scoped items.
pub fn assemble_corpus(entries: Vec<CorpusEntry>) -> Result<Tree, TreeError> {
    let mut tree = Tree::new(CORPUS_KIND);
    let root = tree.root();

    for entry in entries {
        let mut program = entry.program.with_attr("path", entry.path.as_str());
        if let Some(package) = &entry.package {
            let package = serde_json::to_value(package).map_err(|e| TreeError::Malformed(e.to_string()))?;
            program.attrs.insert("package".to_string(), package);
        }

        let id = tree.append(root, program)?;
        tree.set_item(id, FILE_ITEM, entry.path);
        tree.set_item(id, GRAMMAR_ITEM, entry.grammar);
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_engine::GrammarCache;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(GrammarCache::global().load("javascript").unwrap())
    }

    fn normalize_js(source: &str) -> RawNode {
        let n = normalizer();
        let raw = n.grammar().parse(source, "test.js").unwrap();
        n.normalize(raw)
    }

    fn kinds(raw: &RawNode) -> Vec<&str> {
        raw.nodes.iter().map(|n| n.kind.as_str()).collect()
    }

    #[test]
    fn test_aliases_kinds() {
        let program = normalize_js("const f = function () { return o.p; };");
        let declarator = &program.nodes[0].nodes[0];
        assert_eq!(kinds(declarator), vec!["identifier", "function_expression"]);

        let member = &declarator.nodes[1].nodes[1].nodes[0].nodes[0];
        assert_eq!(member.kind, "member_expression");
        assert_eq!(kinds(member), vec!["identifier", "identifier"]);
    }

    #[test]
    fn test_strips_empty_statements() {
        let program = normalize_js("a();;;\nb();");
        assert_eq!(kinds(&program), vec!["expression_statement", "expression_statement"]);
    }

    #[test]
    fn test_keeps_positional_empty_statements() {
        let program = normalize_js("for (;;) ;");
        assert_eq!(kinds(&program.nodes[0]).last(), Some(&"empty_statement"));
    }

    #[test]
    fn test_comments_attach_to_next_sibling() {
        let program = normalize_js("// one\n/** two */\nfunction f() {}\nlet x = 1; // tail");

        assert_eq!(kinds(&program), vec!["function_declaration", "lexical_declaration", "comment"]);
        assert_eq!(program.nodes[0].attrs["comments"], json!(["// one", "/** two */"]));
        assert_eq!(program.nodes[2].value, Some(NodeValue::Text("// tail".to_string())));
    }

    #[test]
    fn test_groups_are_spliced() {
        let raw = RawNode::new("program")
            .with_child(RawNode::group(vec![
                RawNode::leaf("comment", NodeValue::Text("// a".to_string())),
                RawNode::leaf("empty_statement", NodeValue::Text(";".to_string())),
            ]))
            .with_child(RawNode::leaf("identifier", NodeValue::Text("x".to_string())));

        let program = normalizer().normalize(raw);
        assert_eq!(kinds(&program), vec!["identifier"]);
        assert_eq!(program.nodes[0].attrs["comments"], json!(["// a"]));
    }

    #[test]
    fn test_assemble_corpus() {
        let package = PackageInfo {
            name: "pad".to_string(),
            version: None,
            description: None,
            main: None,
        };
        let tree = assemble_corpus(vec![
            CorpusEntry {
                path: "index.js".to_string(),
                grammar: "javascript".to_string(),
                package: Some(package),
                program: normalize_js("let a;"),
            },
            CorpusEntry {
                path: "lib/b.js".to_string(),
                grammar: "javascript".to_string(),
                package: None,
                program: normalize_js("let b;"),
            },
        ])
        .unwrap();

        let root = tree.root();
        assert_eq!(tree.kind(root), CORPUS_KIND);
        let files = tree.children(root).to_vec();
        assert_eq!(files.len(), 2);
        assert_eq!(tree.attr(files[0], "package"), Some(&json!({"name": "pad"})));
        assert_eq!(tree.attr(files[1], "path"), Some(&json!("lib/b.js")));

        let deep = tree.descendants(files[1]).pop().unwrap();
        assert_eq!(tree.item(deep, FILE_ITEM), Some(&json!("lib/b.js")));
        assert_eq!(tree.item(deep, GRAMMAR_ITEM), Some(&json!("javascript")));
        assert_eq!(tree.item(root, FILE_ITEM), None);
    }
}
