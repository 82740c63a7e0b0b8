//! Transform pass: rules that annotate the tree in place before reporting.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::HandlerError;
use crate::tree::{NodeId, Tree, FILE_ITEM, MODULE_ITEM};
use crate::walk::{Event, FnRule, Pass, PassContext, RuleRegistry, RuleSet, WalkStats};

/// Name the transform pass reports in logs and errors.
pub const TRANSFORM_PASS: &str = "transform";

lazy_static! {
    static ref DOC_COMMENT: Regex = Regex::new(r"(?s)^/\*\*(.*?)\*/$").unwrap();
    static ref DOC_LINE_PREFIX: Regex = Regex::new(r"(?m)^[ \t]*\*[ \t]?").unwrap();
}

/// Run the transform pass over a corpus tree.
pub fn run_transform(tree: &mut Tree, rules: RuleSet<()>) -> Result<WalkStats, HandlerError> {
    let pass = Pass::new(TRANSFORM_PASS, RuleRegistry::build(rules));
    pass.run(tree, &mut ())
}

/// Built-in transform rules for the JavaScript family.
pub fn default_rules() -> RuleSet<()> {
    vec![
        FnRule::on("program", module_name).named("module-name").build(),
        FnRule::any(attach_doc)
            .when(|ctx, id| ctx.event() == Event::Enter && ctx.attr(id, "comments").is_some())
            .named("doc-comment")
            .build(),
        FnRule::on("export_statement", mark_exported).named("mark-exported").build(),
        FnRule::on("variable_declarator", mark_required)
            .when(|ctx, id| {
                ctx.children(id)
                    .get(1)
                    .map_or(false, |&value| ctx.like_source(value, "require($_)"))
            })
            .named("mark-required")
            .build(),
    ]
}

/// Module name for a file path: the file stem, or the directory for `index.*`.
pub fn module_name_for(path: &str) -> String {
    let mut segments = path.rsplit('/');
    let file = segments.next().unwrap_or(path);
    let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
    if stem == "index" {
        if let Some(dir) = segments.next() {
            return dir.to_string();
        }
    }
    stem.to_string()
}

/// Strip the delimiters and leading asterisks of a `/** ... */` block.
///
/// Returns `None` for anything that is not a doc comment.
pub fn clean_doc_comment(comment: &str) -> Option<String> {
    let body = DOC_COMMENT.captures(comment.trim())?.get(1)?.as_str();
    let cleaned = DOC_LINE_PREFIX.replace_all(body, "");
    Some(cleaned.trim().to_string())
}

fn module_name(ctx: &mut PassContext<'_, ()>, id: NodeId) -> anyhow::Result<()> {
    let Some(file) = ctx.item_str(id, FILE_ITEM).map(String::from) else {
        return Ok(());
    };
    ctx.set_item(id, MODULE_ITEM, module_name_for(&file));
    Ok(())
}

fn attach_doc(ctx: &mut PassContext<'_, ()>, id: NodeId) -> anyhow::Result<()> {
    let doc = match ctx.attr(id, "comments") {
        Some(Value::Array(comments)) => comments
            .iter()
            .rev()
            .filter_map(Value::as_str)
            .find_map(clean_doc_comment),
        _ => None,
    };
    if let Some(doc) = doc {
        ctx.set_attr(id, "doc", doc);
    }
    Ok(())
}

fn mark_exported(ctx: &mut PassContext<'_, ()>, id: NodeId) -> anyhow::Result<()> {
    let is_default = ctx
        .attr(id, "keywords")
        .and_then(Value::as_array)
        .map_or(false, |words| words.iter().any(|w| w == "default"));
    let Some(&declaration) = ctx.children(id).first() else {
        return Ok(());
    };

    ctx.set_attr(declaration, "exported", true);
    if is_default {
        ctx.set_attr(declaration, "default", true);
    }
    Ok(())
}

fn mark_required(ctx: &mut PassContext<'_, ()>, id: NodeId) -> anyhow::Result<()> {
    let specifier = ctx
        .children(id)
        .get(1)
        .and_then(|&call| ctx.tree().child_of_kind(call, "arguments"))
        .and_then(|args| ctx.children(args).first().copied())
        .and_then(|arg| ctx.text(arg))
        .map(unquote);

    if let Some(specifier) = specifier {
        ctx.set_attr(id, "required", specifier);
    }
    Ok(())
}

fn unquote(literal: &str) -> String {
    literal.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}
