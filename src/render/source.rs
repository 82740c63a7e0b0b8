//! Source reconstruction: node tree back to source text.
//!
//! Each grammar with reconstruction support has a table from node type to a
//! render function. A node type missing from the table is a hard error.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_json::Value;

use crate::error::RenderError;
use crate::tree::{NodeId, Tree};

type Entry = fn(&mut Emitter<'_>, NodeId) -> Result<String, RenderError>;

const INDENT: &str = "  ";

lazy_static! {
    static ref JAVASCRIPT: HashMap<&'static str, Entry> = javascript_table();
}

/// Renders nodes of one grammar.
#[derive(Clone, Copy)]
pub struct Reconstructor {
    table: &'static HashMap<&'static str, Entry>,
}

impl std::fmt::Debug for Reconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructor").field("entries", &self.table.len()).finish()
    }
}

impl Reconstructor {
    /// Reconstruction support for a grammar, if any.
    pub fn for_grammar(grammar: &str) -> Option<Self> {
        match grammar {
            "javascript" => Some(Self { table: &JAVASCRIPT }),
            _ => None,
        }
    }

    pub fn supports(grammar: &str) -> bool {
        Self::for_grammar(grammar).is_some()
    }

    pub fn covers(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }

    /// Render a subtree.
    pub fn render(&self, tree: &Tree, id: NodeId) -> Result<String, RenderError> {
        let mut emitter = Emitter {
            tree,
            table: self.table,
            depth: 0,
        };
        emitter.render(id)
    }
}

struct Emitter<'a> {
    tree: &'a Tree,
    table: &'static HashMap<&'static str, Entry>,
    depth: usize,
}

impl<'a> Emitter<'a> {
    fn render(&mut self, id: NodeId) -> Result<String, RenderError> {
        let kind = self.tree.kind(id);
        let entry = self
            .table
            .get(kind)
            .ok_or_else(|| RenderError::MissingEntry(kind.to_string()))?;
        let body = entry(self, id)?;
        Ok(self.with_comments(id, body))
    }

    /// Prefix the comments the normalizer attached to this node.
    fn with_comments(&self, id: NodeId, body: String) -> String {
        let Some(Value::Array(comments)) = self.tree.attr(id, "comments") else {
            return body;
        };
        let mut out = String::new();
        for comment in comments.iter().filter_map(Value::as_str) {
            out.push_str(comment);
            out.push('\n');
            out.push_str(&self.indent());
        }
        out.push_str(&body);
        out
    }

    fn indent(&self) -> String {
        INDENT.repeat(self.depth)
    }

    fn kind(&self, id: NodeId) -> &'a str {
        self.tree.kind(id)
    }

    fn kids(&self, id: NodeId) -> &'a [NodeId] {
        self.tree.children(id)
    }

    fn child(&self, id: NodeId, index: usize) -> Result<NodeId, RenderError> {
        self.kids(id)
            .get(index)
            .copied()
            .ok_or_else(|| self.malformed(id, &format!("missing child {}", index)))
    }

    fn malformed(&self, id: NodeId, reason: &str) -> RenderError {
        RenderError::Malformed {
            kind: self.kind(id).to_string(),
            reason: reason.to_string(),
        }
    }

    fn keywords(&self, id: NodeId) -> Vec<&'a str> {
        match self.tree.attr(id, "keywords") {
            Some(Value::Array(words)) => words.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    fn has_keyword(&self, id: NodeId, word: &str) -> bool {
        self.keywords(id).contains(&word)
    }

    fn operator(&self, id: NodeId) -> Result<&'a str, RenderError> {
        self.tree
            .attr(id, "operator")
            .and_then(Value::as_str)
            .ok_or_else(|| self.malformed(id, "missing operator"))
    }

    fn join(&mut self, ids: &[NodeId], sep: &str) -> Result<String, RenderError> {
        let parts = ids.iter().map(|&c| self.render(c)).collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(sep))
    }

    fn nth(&mut self, id: NodeId, index: usize) -> Result<String, RenderError> {
        let child = self.child(id, index)?;
        self.render(child)
    }

    /// Children one per line, one level deeper.
    fn lines(&mut self, ids: &[NodeId], suffix: impl Fn(&str) -> &'static str) -> Result<Vec<String>, RenderError> {
        self.depth += 1;
        let indent = self.indent();
        let result = ids
            .iter()
            .map(|&c| {
                let text = self.render(c)?;
                Ok(format!("{}{}{}", indent, text, suffix(self.kind(c))))
            })
            .collect::<Result<Vec<_>, RenderError>>();
        self.depth -= 1;
        result
    }

    /// Leading decorators rendered as `@a @b `, and the children after them.
    fn decorated(&mut self, id: NodeId) -> Result<(String, &'a [NodeId]), RenderError> {
        let kids = self.kids(id);
        let count = kids.iter().take_while(|&&k| self.kind(k) == "decorator").count();
        let mut prefix = String::new();
        for &decorator in &kids[..count] {
            prefix.push_str(&self.render(decorator)?);
            prefix.push(' ');
        }
        Ok((prefix, &kids[count..]))
    }

    fn braced_block(&mut self, ids: &[NodeId], suffix: impl Fn(&str) -> &'static str) -> Result<String, RenderError> {
        if ids.is_empty() {
            return Ok("{}".to_string());
        }
        let lines = self.lines(ids, suffix)?;
        Ok(format!("{{\n{}\n{}}}", lines.join("\n"), self.indent()))
    }
}

fn no_suffix(_: &str) -> &'static str {
    ""
}

fn javascript_table() -> HashMap<&'static str, Entry> {
    let entries: &[(&'static str, Entry)] = &[
        ("program", program),
        ("hash_bang_line", text),
        ("comment", comment),
        ("html_comment", comment),
        ("empty_statement", |_, _| Ok(";".to_string())),
        ("debugger_statement", |_, _| Ok("debugger;".to_string())),
        ("expression_statement", expression_statement),
        ("lexical_declaration", lexical_declaration),
        ("variable_declaration", variable_declaration),
        ("variable_declarator", variable_declarator),
        ("function_declaration", function),
        ("generator_function_declaration", function),
        ("function_expression", function),
        ("generator_function", function),
        ("arrow_function", arrow_function),
        ("formal_parameters", |e, id| Ok(format!("({})", e.join(e.kids(id), ", ")?))),
        ("statement_block", |e, id| e.braced_block(e.kids(id), no_suffix)),
        ("return_statement", |e, id| keyword_statement(e, id, "return")),
        ("throw_statement", |e, id| keyword_statement(e, id, "throw")),
        ("break_statement", |e, id| keyword_statement(e, id, "break")),
        ("continue_statement", |e, id| keyword_statement(e, id, "continue")),
        ("if_statement", if_statement),
        ("else_clause", else_clause),
        ("while_statement", |e, id| headed_statement(e, id, "while")),
        ("with_statement", |e, id| headed_statement(e, id, "with")),
        ("do_statement", do_statement),
        ("for_statement", for_statement),
        ("for_in_statement", for_in_statement),
        ("labeled_statement", |e, id| Ok(format!("{}: {}", e.nth(id, 0)?, e.nth(id, 1)?))),
        ("switch_statement", |e, id| Ok(format!("switch {} {}", e.nth(id, 0)?, e.nth(id, 1)?))),
        ("switch_body", |e, id| e.braced_block(e.kids(id), no_suffix)),
        ("switch_case", switch_case),
        ("switch_default", switch_case),
        ("try_statement", try_statement),
        ("catch_clause", catch_clause),
        ("finally_clause", |e, id| Ok(format!("finally {}", e.nth(id, 0)?))),
        ("class_declaration", class),
        ("class", class),
        ("class_heritage", |e, id| Ok(format!("extends {}", e.nth(id, 0)?))),
        ("class_body", |e, id| {
            e.braced_block(e.kids(id), |kind| if kind == "field_definition" { ";" } else { "" })
        }),
        ("class_static_block", |e, id| Ok(format!("static {}", e.nth(id, 0)?))),
        ("decorator", |e, id| Ok(format!("@{}", e.nth(id, 0)?))),
        ("method_definition", method_definition),
        ("field_definition", field_definition),
        ("call_expression", |e, id| e.join(e.kids(id), "")),
        ("new_expression", new_expression),
        ("arguments", |e, id| Ok(format!("({})", e.join(e.kids(id), ", ")?))),
        ("member_expression", member_expression),
        ("subscript_expression", subscript_expression),
        ("assignment_expression", |e, id| infix(e, id, "=")),
        ("augmented_assignment_expression", |e, id| {
            let op = e.operator(id)?;
            infix(e, id, op)
        }),
        ("binary_expression", |e, id| {
            let op = e.operator(id)?;
            infix(e, id, op)
        }),
        ("unary_expression", unary_expression),
        ("update_expression", update_expression),
        ("ternary_expression", |e, id| {
            Ok(format!("{} ? {} : {}", e.nth(id, 0)?, e.nth(id, 1)?, e.nth(id, 2)?))
        }),
        ("parenthesized_expression", |e, id| Ok(format!("({})", e.join(e.kids(id), ", ")?))),
        ("sequence_expression", |e, id| e.join(e.kids(id), ", ")),
        ("await_expression", |e, id| Ok(format!("await {}", e.nth(id, 0)?))),
        ("yield_expression", yield_expression),
        ("spread_element", |e, id| Ok(format!("...{}", e.nth(id, 0)?))),
        ("rest_pattern", |e, id| Ok(format!("...{}", e.nth(id, 0)?))),
        ("object", |e, id| braced_list(e, id)),
        ("object_pattern", |e, id| braced_list(e, id)),
        ("pair", |e, id| infix(e, id, ":")),
        ("pair_pattern", |e, id| infix(e, id, ":")),
        ("computed_property_name", |e, id| Ok(format!("[{}]", e.nth(id, 0)?))),
        ("object_assignment_pattern", |e, id| infix(e, id, "=")),
        ("assignment_pattern", |e, id| infix(e, id, "=")),
        ("array", |e, id| Ok(format!("[{}]", e.join(e.kids(id), ", ")?))),
        ("array_pattern", |e, id| Ok(format!("[{}]", e.join(e.kids(id), ", ")?))),
        ("meta_property", |e, id| Ok(e.keywords(id).join("."))),
        ("import_statement", import_statement),
        ("import_attribute", |e, id| Ok(format!("with {}", e.nth(id, 0)?))),
        ("import_clause", |e, id| e.join(e.kids(id), ", ")),
        ("namespace_import", |e, id| Ok(format!("* as {}", e.nth(id, 0)?))),
        ("namespace_export", |e, id| Ok(format!("* as {}", e.nth(id, 0)?))),
        ("named_imports", |e, id| braced_list(e, id)),
        ("import_specifier", import_specifier),
        ("export_statement", export_statement),
        ("export_clause", |e, id| braced_list(e, id)),
        ("export_specifier", |e, id| aliased(e, id)),
        ("jsx_element", |e, id| e.join(e.kids(id), "")),
        ("jsx_opening_element", jsx_opening_element),
        ("jsx_closing_element", jsx_closing_element),
        ("jsx_self_closing_element", jsx_self_closing_element),
        ("jsx_attribute", jsx_attribute),
        ("jsx_expression", |e, id| Ok(format!("{{{}}}", e.join(e.kids(id), "")?))),
        ("jsx_namespace_name", |e, id| e.join(e.kids(id), ":")),
    ];

    let leaves = [
        "identifier",
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
        "jsx_text",
        "html_character_reference",
        "glimmer_template",
    ];

    let mut table: HashMap<&'static str, Entry> = entries.iter().copied().collect();
    for leaf in leaves {
        table.insert(leaf, text);
    }
    table
}

fn text(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    e.tree
        .value(id)
        .map(|v| v.to_string())
        .ok_or_else(|| e.malformed(id, "leaf without value"))
}

fn comment(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let body = text(e, id)?;
    if body.starts_with("//") || body.starts_with("<!--") || body.starts_with("-->") {
        // Whatever follows must start on a fresh line
        Ok(format!("{}\n{}", body, e.indent()))
    } else {
        Ok(body)
    }
}

fn program(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let mut out = e.join(e.kids(id), "\n")?;
    out.push('\n');
    Ok(out)
}

fn expression_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    Ok(format!("{};", e.join(e.kids(id), ", ")?))
}

fn lexical_declaration(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let keyword = e
        .keywords(id)
        .first()
        .copied()
        .ok_or_else(|| e.malformed(id, "missing declaration keyword"))?;
    Ok(format!("{} {};", keyword, e.join(e.kids(id), ", ")?))
}

fn variable_declaration(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    Ok(format!("var {};", e.join(e.kids(id), ", ")?))
}

fn variable_declarator(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let name = e.nth(id, 0)?;
    match e.kids(id).get(1) {
        Some(&value) => Ok(format!("{} = {}", name, e.render(value)?)),
        None => Ok(name),
    }
}

/// Declarations and expressions of (generator) functions.
fn function(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let mut out = e.keywords(id).join(" ");
    if out.is_empty() {
        out.push_str("function");
    }
    for &child in e.kids(id) {
        match e.kind(child) {
            "identifier" => {
                out.push(' ');
                out.push_str(&e.render(child)?);
            }
            "statement_block" => {
                out.push(' ');
                out.push_str(&e.render(child)?);
            }
            _ => out.push_str(&e.render(child)?),
        }
    }
    Ok(out)
}

fn arrow_function(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let prefix = if e.has_keyword(id, "async") { "async " } else { "" };
    Ok(format!("{}{} => {}", prefix, e.nth(id, 0)?, e.nth(id, 1)?))
}

fn keyword_statement(e: &mut Emitter<'_>, id: NodeId, keyword: &str) -> Result<String, RenderError> {
    match e.kids(id) {
        [] => Ok(format!("{};", keyword)),
        kids => Ok(format!("{} {};", keyword, e.join(kids, ", ")?)),
    }
}

/// A statement body, or `;` where an empty statement was stripped.
fn body_or_empty(e: &mut Emitter<'_>, body: Option<NodeId>) -> Result<String, RenderError> {
    match body {
        Some(body) => e.render(body),
        None => Ok(";".to_string()),
    }
}

fn if_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let kids = e.kids(id);
    let condition = e.nth(id, 0)?;
    let (consequence, alternative) = match kids.get(1) {
        Some(&c) if e.kind(c) == "else_clause" => (None, Some(c)),
        Some(&c) => (Some(c), kids.get(2).copied()),
        None => (None, None),
    };

    let mut out = format!("if {} {}", condition, body_or_empty(e, consequence)?);
    if let Some(alternative) = alternative {
        out.push(' ');
        out.push_str(&e.render(alternative)?);
    }
    Ok(out)
}

fn else_clause(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let body = e.kids(id).first().copied();
    Ok(format!("else {}", body_or_empty(e, body)?))
}

/// `while` and `with`: keyword, parenthesized head, body.
fn headed_statement(e: &mut Emitter<'_>, id: NodeId, keyword: &str) -> Result<String, RenderError> {
    let body = e.kids(id).get(1).copied();
    Ok(format!("{} {} {}", keyword, e.nth(id, 0)?, body_or_empty(e, body)?))
}

fn do_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [body, condition] => Ok(format!("do {} while {};", e.render(*body)?, e.render(*condition)?)),
        [condition] => Ok(format!("do ; while {};", e.render(*condition)?)),
        _ => Err(e.malformed(id, "expected body and condition")),
    }
}

fn for_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let fields: Vec<Option<&str>> = match e.tree.attr(id, "fields") {
        Some(Value::Array(fields)) => fields.iter().map(Value::as_str).collect(),
        _ => return Err(e.malformed(id, "missing field names")),
    };
    let field = |name: &str| {
        fields
            .iter()
            .position(|f| *f == Some(name))
            .and_then(|i| e.kids(id).get(i).copied())
    };
    let (initializer, condition, increment, body) =
        (field("initializer"), field("condition"), field("increment"), field("body"));

    let mut out = String::from("for (");
    for part in [initializer, condition] {
        match part {
            Some(part) => {
                let rendered = e.render(part)?;
                let terminated = rendered.ends_with(';');
                out.push_str(&rendered);
                if !terminated {
                    out.push(';');
                }
            }
            None => out.push(';'),
        }
        out.push(' ');
    }
    if let Some(increment) = increment {
        out.push_str(&e.render(increment)?);
    }
    out.push_str(") ");
    out.push_str(&body_or_empty(e, body)?);
    Ok(out)
}

fn for_in_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let keywords = e.keywords(id);
    let operator = e.operator(id)?;
    let kind = keywords
        .iter()
        .find(|k| matches!(**k, "const" | "let" | "var"))
        .map(|k| format!("{} ", k))
        .unwrap_or_default();
    let head = if keywords.contains(&"await") { "for await" } else { "for" };

    let body = e.kids(id).get(2).copied();
    Ok(format!(
        "{} ({}{} {} {}) {}",
        head,
        kind,
        e.nth(id, 0)?,
        operator,
        e.nth(id, 1)?,
        body_or_empty(e, body)?
    ))
}

fn switch_case(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let kids = e.kids(id);
    let (mut out, statements) = if e.kind(id) == "switch_default" {
        ("default:".to_string(), kids)
    } else {
        let (value, rest) = kids.split_first().ok_or_else(|| e.malformed(id, "missing case value"))?;
        (format!("case {}:", e.render(*value)?), rest)
    };
    for line in e.lines(statements, no_suffix)? {
        out.push('\n');
        out.push_str(&line);
    }
    Ok(out)
}

fn try_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    Ok(format!("try {}", e.join(e.kids(id), " ")?))
}

fn catch_clause(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [param, body] => Ok(format!("catch ({}) {}", e.render(*param)?, e.render(*body)?)),
        [body] => Ok(format!("catch {}", e.render(*body)?)),
        _ => Err(e.malformed(id, "expected parameter and body")),
    }
}

fn class(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let (mut out, kids) = e.decorated(id)?;
    out.push_str("class");
    for &child in kids {
        out.push(' ');
        out.push_str(&e.render(child)?);
    }
    Ok(out)
}

fn method_definition(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let (mut out, kids) = e.decorated(id)?;
    let keywords = e.keywords(id).join(" ");
    if !keywords.is_empty() {
        out.push_str(&keywords);
        out.push(' ');
    }
    for &child in kids {
        if e.kind(child) == "statement_block" {
            out.push(' ');
        }
        out.push_str(&e.render(child)?);
    }
    Ok(out)
}

fn field_definition(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let (mut out, kids) = e.decorated(id)?;
    let keywords = e.keywords(id).join(" ");
    if !keywords.is_empty() {
        out.push_str(&keywords);
        out.push(' ');
    }
    let property = *kids.first().ok_or_else(|| e.malformed(id, "missing property"))?;
    out.push_str(&e.render(property)?);
    if let Some(&value) = kids.get(1) {
        out.push_str(" = ");
        out.push_str(&e.render(value)?);
    }
    Ok(out)
}

fn new_expression(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    Ok(format!("new {}", e.join(e.kids(id), "")?))
}

fn member_expression(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [object, chain, property] => Ok(format!("{}{}{}", e.render(*object)?, e.render(*chain)?, e.render(*property)?)),
        [object, property] => Ok(format!("{}.{}", e.render(*object)?, e.render(*property)?)),
        _ => Err(e.malformed(id, "expected object and property")),
    }
}

fn subscript_expression(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [object, chain, index] => Ok(format!("{}{}[{}]", e.render(*object)?, e.render(*chain)?, e.render(*index)?)),
        [object, index] => Ok(format!("{}[{}]", e.render(*object)?, e.render(*index)?)),
        _ => Err(e.malformed(id, "expected object and index")),
    }
}

fn infix(e: &mut Emitter<'_>, id: NodeId, op: &str) -> Result<String, RenderError> {
    let left = e.nth(id, 0)?;
    let right = e.nth(id, 1)?;
    if op == ":" {
        Ok(format!("{}: {}", left, right))
    } else {
        Ok(format!("{} {} {}", left, op, right))
    }
}

fn unary_expression(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let op = e.operator(id)?;
    let arg = e.nth(id, 0)?;
    if op.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(format!("{} {}", op, arg))
    } else {
        Ok(prefixed(op, &arg))
    }
}

fn update_expression(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let op = e.operator(id)?;
    let arg = e.nth(id, 0)?;
    if e.tree.attr(id, "prefix") == Some(&Value::Bool(true)) {
        Ok(prefixed(op, &arg))
    } else {
        Ok(format!("{}{}", arg, op))
    }
}

/// `op` directly before `arg`, spaced when the two signs would merge into
/// `++` or `--`.
fn prefixed(op: &str, arg: &str) -> String {
    match (op.chars().last(), arg.chars().next()) {
        (Some(a), Some(b)) if a == b && matches!(a, '+' | '-') => format!("{} {}", op, arg),
        _ => format!("{}{}", op, arg),
    }
}

fn yield_expression(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let mut out = String::from("yield");
    if e.has_keyword(id, "*") {
        out.push('*');
    }
    if let Some(&arg) = e.kids(id).first() {
        out.push(' ');
        out.push_str(&e.render(arg)?);
    }
    Ok(out)
}

fn braced_list(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [] => Ok("{}".to_string()),
        kids => Ok(format!("{{ {} }}", e.join(kids, ", ")?)),
    }
}

fn aliased(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [name] => e.render(*name),
        [name, alias] => Ok(format!("{} as {}", e.render(*name)?, e.render(*alias)?)),
        _ => Err(e.malformed(id, "expected name and optional alias")),
    }
}

fn import_specifier(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    if e.has_keyword(id, "default") {
        return Ok(format!("default as {}", e.nth(id, 0)?));
    }
    aliased(e, id)
}

fn import_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let kids = e.kids(id);
    let (kids, attribute) = match kids.split_last() {
        Some((&last, rest)) if e.kind(last) == "import_attribute" => (rest, Some(last)),
        _ => (kids, None),
    };
    let suffix = match attribute {
        Some(attribute) => format!(" {}", e.render(attribute)?),
        None => String::new(),
    };
    match kids {
        [source] => Ok(format!("import {}{};", e.render(*source)?, suffix)),
        [clause, source, ..] => Ok(format!(
            "import {} from {}{};",
            e.render(*clause)?,
            e.render(*source)?,
            suffix
        )),
        [] => Err(e.malformed(id, "missing source")),
    }
}

const DECLARATIONS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "class_declaration",
    "lexical_declaration",
    "variable_declaration",
];

fn export_statement(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    let (decorators, kids) = e.decorated(id)?;
    let body = export_body(e, id, kids)?;
    Ok(format!("{}{}", decorators, body))
}

fn export_body(e: &mut Emitter<'_>, id: NodeId, kids: &[NodeId]) -> Result<String, RenderError> {
    let first = *kids.first().ok_or_else(|| e.malformed(id, "empty export"))?;
    let is_declaration = DECLARATIONS.contains(&e.kind(first));

    if e.has_keyword(id, "default") {
        let body = e.render(first)?;
        return Ok(if is_declaration {
            format!("export default {}", body)
        } else {
            format!("export default {};", body)
        });
    }
    if is_declaration {
        return Ok(format!("export {}", e.render(first)?));
    }
    if e.has_keyword(id, "*") {
        return Ok(format!("export * from {};", e.render(first)?));
    }

    match kids {
        [clause] => Ok(format!("export {};", e.render(*clause)?)),
        [clause, source] => Ok(format!("export {} from {};", e.render(*clause)?, e.render(*source)?)),
        _ => Err(e.malformed(id, "unexpected export shape")),
    }
}

/// Tag name followed by its attributes, space separated.
fn jsx_tag(e: &mut Emitter<'_>, name: NodeId, attributes: &[NodeId]) -> Result<String, RenderError> {
    let mut out = e.render(name)?;
    for &attribute in attributes {
        out.push(' ');
        out.push_str(&e.render(attribute)?);
    }
    Ok(out)
}

fn jsx_opening_element(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [] => Ok("<>".to_string()),
        [name, attributes @ ..] => Ok(format!("<{}>", jsx_tag(e, *name, attributes)?)),
    }
}

fn jsx_closing_element(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [] => Ok("</>".to_string()),
        [name] => Ok(format!("</{}>", e.render(*name)?)),
        _ => Err(e.malformed(id, "expected at most a tag name")),
    }
}

fn jsx_self_closing_element(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [name, attributes @ ..] => Ok(format!("<{} />", jsx_tag(e, *name, attributes)?)),
        [] => Err(e.malformed(id, "missing tag name")),
    }
}

fn jsx_attribute(e: &mut Emitter<'_>, id: NodeId) -> Result<String, RenderError> {
    match e.kids(id) {
        [name] => e.render(*name),
        [name, value] => Ok(format!("{}={}", e.render(*name)?, e.render(*value)?)),
        _ => Err(e.malformed(id, "expected name and optional value")),
    }
}
