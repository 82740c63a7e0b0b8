//! Built-in report rules for the JavaScript family.
//!
//! Key scheme: a module is keyed by its path, module members by
//! `<module>#<name>` and class members by `<class>.<name>`.

use serde_json::Value;

use super::graph::{Item, ReportGraph, ROOT_GROUP};
use crate::render::Reconstructor;
use crate::tree::{NodeId, Tree, FILE_ITEM, GRAMMAR_ITEM, MODULE_ITEM};
use crate::types::PackageInfo;
use crate::walk::{end_key, FnRule, PassContext, RuleSet};

/// Scoped item naming the group new items are added under.
pub const GROUP_SCOPE: &str = "report.group";

/// Scoped item naming the enclosing module's key.
pub const MODULE_SCOPE: &str = "report.module";

/// Attribute naming the package of a module that is not its entry point.
pub const PACKAGE_MEMBER_ATTR: &str = "inPackage";

type Ctx<'a> = PassContext<'a, ReportGraph>;

const ACCESSOR_FLAGS: &[&str] = &["get", "set"];

const FUNCTION_VALUES: &[&str] = &["function_expression", "arrow_function", "generator_function"];

const DECLARATION_WRAPPERS: &[&str] = &["lexical_declaration", "variable_declaration", "export_statement"];

/// Built-in report rules.
pub fn default_rules() -> RuleSet<ReportGraph> {
    vec![
        FnRule::on("program", add_module).named("module").build(),
        FnRule::on("class_declaration", add_class)
            .when(|ctx, id| name_of(ctx.tree(), id).is_some())
            .named("class")
            .build(),
        FnRule::on("method_definition", add_method)
            .when(|ctx, id| {
                // Only members of a class body, of a class that made it into the report
                let tree = ctx.tree();
                tree.parent(id).map_or(false, |body| tree.kind(body) == "class_body")
                    && name_of(tree, id).is_some()
                    && ctx.item_str(id, GROUP_SCOPE) != ctx.item_str(id, MODULE_SCOPE)
            })
            .named("method")
            .build(),
        FnRule::on("function_declaration", add_function)
            .when(|ctx, id| is_module_level(ctx.tree(), id) && name_of(ctx.tree(), id).is_some())
            .named("function")
            .build(),
        FnRule::on("generator_function_declaration", add_function)
            .when(|ctx, id| is_module_level(ctx.tree(), id) && name_of(ctx.tree(), id).is_some())
            .named("generator")
            .build(),
        FnRule::on("variable_declarator", add_declarator)
            .when(|ctx, id| {
                let tree = ctx.tree();
                tree.parent(id).map_or(false, |decl| is_module_level(tree, decl)) && name_of(tree, id).is_some()
            })
            .named("declarator")
            .build(),
        FnRule::on(&end_key("corpus"), link_requires).named("link-requires").build(),
    ]
}

fn add_module(ctx: &mut Ctx<'_>, id: NodeId) -> anyhow::Result<()> {
    let tree = ctx.tree();
    let Some(path) = tree
        .attr(id, "path")
        .and_then(Value::as_str)
        .or_else(|| tree.item(id, FILE_ITEM).and_then(Value::as_str))
        .map(String::from)
    else {
        return Ok(());
    };

    let mut item = Item::new(path.as_str())
        .with_type("module")
        .with_group(ROOT_GROUP)
        .with_attr("path", path.as_str());
    if let Some(name) = tree.item(id, MODULE_ITEM).and_then(Value::as_str) {
        item = item.with_name(name);
    }
    if let Some(doc) = tree.attr(id, "doc") {
        item = item.with_attr("doc", doc.clone());
    }
    // Package metadata goes on the entry module; siblings only record the name
    if let Some(package) = tree.attr(id, "package") {
        let info: PackageInfo = serde_json::from_value(package.clone())?;
        let file_name = path.rsplit('/').next().unwrap_or(&path);
        item = if info.is_main(file_name) {
            item.as_home().with_attr("package", package.clone())
        } else {
            item.with_attr(PACKAGE_MEMBER_ATTR, info.name.as_str())
        };
    }

    ctx.state.add(item)?;
    ctx.set_item(id, GROUP_SCOPE, path.as_str());
    ctx.set_item(id, MODULE_SCOPE, path);
    Ok(())
}

fn add_class(ctx: &mut Ctx<'_>, id: NodeId) -> anyhow::Result<()> {
    let Some(item) = member_item(ctx.tree(), id, "class") else {
        return Ok(());
    };
    let key = item.key.clone();
    ctx.state.replace(item)?;
    ctx.set_item(id, GROUP_SCOPE, key);
    Ok(())
}

fn add_method(ctx: &mut Ctx<'_>, id: NodeId) -> anyhow::Result<()> {
    let tree = ctx.tree();
    let Some(mut item) = member_item(tree, id, "method") else {
        return Ok(());
    };
    for keyword in keywords(tree, id) {
        match keyword {
            "static" | "async" | "get" | "set" => item = item.with_attr(keyword, true),
            "*" => item = item.with_attr("generator", true),
            _ => {}
        }
    }
    if let Some(params) = tree.child_of_kind(id, "formal_parameters") {
        item = item.with_attr("params", render_params(tree, params)?);
    }
    let item = merge_accessor(ctx.state, item);
    ctx.state.replace(item)?;
    Ok(())
}

/// A getter and setter of the same name share one item carrying both flags.
fn merge_accessor(graph: &ReportGraph, mut item: Item) -> Item {
    let is_accessor = |i: &Item| ACCESSOR_FLAGS.iter().any(|f| i.attr(f) == Some(&Value::Bool(true)));
    let Some(existing) = graph.item(&item.key) else {
        return item;
    };
    if existing.kind != "method" || !is_accessor(existing) || !is_accessor(&item) {
        return item;
    }
    for key in ACCESSOR_FLAGS.iter().chain(&["doc"]) {
        if item.attr(key).is_none() {
            if let Some(value) = existing.attr(key) {
                item = item.with_attr(key, value.clone());
            }
        }
    }
    item
}

fn add_function(ctx: &mut Ctx<'_>, id: NodeId) -> anyhow::Result<()> {
    let tree = ctx.tree();
    let Some(mut item) = member_item(tree, id, "function") else {
        return Ok(());
    };
    if keywords(tree, id).contains(&"async") {
        item = item.with_attr("async", true);
    }
    if let Some(params) = tree.child_of_kind(id, "formal_parameters") {
        item = item.with_attr("params", render_params(tree, params)?);
    }
    ctx.state.replace(item)?;
    Ok(())
}

fn add_declarator(ctx: &mut Ctx<'_>, id: NodeId) -> anyhow::Result<()> {
    let tree = ctx.tree();
    let value = tree.children(id).get(1).copied();
    let is_function = value.map_or(false, |v| FUNCTION_VALUES.contains(&tree.kind(v)));

    let Some(mut item) = member_item(tree, id, if is_function { "function" } else { "variable" }) else {
        return Ok(());
    };
    if let (true, Some(value)) = (is_function, value) {
        if let Some(params) = function_params(tree, value)? {
            item = item.with_attr("params", params);
        }
    }
    if let Some(spec) = tree.attr(id, "required").and_then(Value::as_str) {
        item = item.with_attr("required", true).with_attr("requires", spec);
    }
    if let Some(declaration) = tree.parent(id) {
        if let Some(&keyword) = keywords(tree, declaration).first() {
            item = item.with_attr("declaration", keyword);
        }
    }
    ctx.state.replace(item)?;
    Ok(())
}

/// Attach every resolvable relative `require` target under the item that
/// requires it.
fn link_requires(ctx: &mut Ctx<'_>, _id: NodeId) -> anyhow::Result<()> {
    let graph: &ReportGraph = ctx.state;
    let links: Vec<(String, String)> = graph
        .items()
        .filter_map(|item| {
            let spec = item.attr("requires")?.as_str()?;
            let module = item.key.split('#').next()?;
            let target = resolve_require(graph, module, spec)?;
            (target != item.key).then(|| (target, item.key.clone()))
        })
        .collect();

    for (target, requirer) in links {
        ctx.state.attach(&target, &requirer)?;
    }
    Ok(())
}

/// Resolve a relative require specifier against the requiring module's path.
pub fn resolve_require(graph: &ReportGraph, module: &str, spec: &str) -> Option<String> {
    if !spec.starts_with('.') {
        return None;
    }
    let base = module.rsplit_once('/').map_or("", |(dir, _)| dir);
    let joined = normalize_path(&format!("{}/{}", base, spec))?;

    [joined.clone(), format!("{}.js", joined), format!("{}/index.js", joined)]
        .into_iter()
        .find(|candidate| graph.item(candidate).map_or(false, |item| item.kind == "module"))
}

fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// A member item keyed under the current group, with doc and export flags.
fn member_item(tree: &Tree, id: NodeId, kind: &str) -> Option<Item> {
    let name = name_of(tree, id)?;
    let group = tree.item(id, GROUP_SCOPE)?.as_str()?;
    let module = tree.item(id, MODULE_SCOPE).and_then(Value::as_str);

    let key = if Some(group) == module {
        format!("{}#{}", group, name)
    } else {
        format!("{}.{}", group, name)
    };

    let mut item = Item::new(key).with_type(kind).with_name(name).with_group(group);
    for attr in ["doc", "exported", "default"] {
        if let Some(value) = inherited_attr(tree, id, attr) {
            item = item.with_attr(attr, value.clone());
        }
    }
    if let Some(location) = tree.location_of(id) {
        item = item.with_attr("line", location.line);
    }
    Some(item)
}

/// An attribute on the node or on the declaration/export wrappers around it.
fn inherited_attr<'t>(tree: &'t Tree, id: NodeId, key: &str) -> Option<&'t Value> {
    if let Some(value) = tree.attr(id, key) {
        return Some(value);
    }
    let mut current = id;
    while let Some(parent) = tree.parent(current) {
        if !DECLARATION_WRAPPERS.contains(&tree.kind(parent)) {
            break;
        }
        if let Some(value) = tree.attr(parent, key) {
            return Some(value);
        }
        current = parent;
    }
    None
}

fn name_of(tree: &Tree, id: NodeId) -> Option<&str> {
    let first = tree
        .children(id)
        .iter()
        .copied()
        .find(|&child| tree.kind(child) != "decorator")?;
    match tree.kind(first) {
        "identifier" => tree.text(first),
        _ => None,
    }
}

fn is_module_level(tree: &Tree, id: NodeId) -> bool {
    match tree.parent(id) {
        Some(parent) if tree.kind(parent) == "program" => true,
        Some(parent) if tree.kind(parent) == "export_statement" => {
            tree.parent(parent).map_or(false, |p| tree.kind(p) == "program")
        }
        _ => false,
    }
}

fn keywords(tree: &Tree, id: NodeId) -> Vec<&str> {
    tree.attr(id, "keywords")
        .and_then(Value::as_array)
        .map(|words| words.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Parameter list of a function-valued expression.
fn function_params(tree: &Tree, function: NodeId) -> anyhow::Result<Option<String>> {
    if let Some(params) = tree.child_of_kind(function, "formal_parameters") {
        return render_params(tree, params).map(Some);
    }
    // Arrow functions with a single bare parameter
    match tree.children(function).first() {
        Some(&param) if tree.kind(function) == "arrow_function" && tree.kind(param) == "identifier" => {
            Ok(tree.text(param).map(|name| format!("({})", name)))
        }
        _ => Ok(None),
    }
}

fn render_params(tree: &Tree, params: NodeId) -> anyhow::Result<String> {
    let grammar = tree.item(params, GRAMMAR_ITEM).and_then(Value::as_str).unwrap_or_default();
    match Reconstructor::for_grammar(grammar) {
        Some(reconstructor) if reconstructor.covers(tree.kind(params)) => Ok(reconstructor.render(tree, params)?),
        _ => {
            let names: Vec<&str> = tree.children(params).iter().filter_map(|&p| tree.text(p)).collect();
            Ok(format!("({})", names.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse_corpus;
    use crate::report::{build_report, post_process};
    use crate::transform;
    use crate::types::SourceFile;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const INDEX: &str = r#"/** Pads things. */
const pad = require('./pad');
const VERSION = '1.0.0';
class Padder {
  /** Pad left. */
  left(s, n) { return pad(s, n); }
  static create() { return new Padder(); }
}
const right = (s) => s;
module.exports = { pad, Padder, right };
"#;

    const PAD: &str = "function pad(s, n = 1) {\n  function inner() {}\n  return s;\n}\nmodule.exports = pad;\n";

    fn package() -> PackageInfo {
        PackageInfo {
            name: "left-pad".to_string(),
            version: Some("1.0.0".to_string()),
            description: None,
            main: None,
        }
    }

    fn graph() -> ReportGraph {
        let files = vec![
            SourceFile::new("lib/index.js", INDEX, "javascript").with_package(package()),
            SourceFile::new("lib/pad.js", PAD, "javascript"),
        ];
        let mut tree = parse_corpus(&files).unwrap();
        transform::run_transform(&mut tree, transform::default_rules()).unwrap();
        let (graph, _) = build_report(&mut tree, default_rules()).unwrap();
        graph
    }

    fn keys(graph: &ReportGraph) -> Vec<&str> {
        graph.items().map(|i| i.key.as_str()).collect()
    }

    #[test]
    fn test_report_items() {
        let graph = graph();
        assert_eq!(
            keys(&graph),
            vec![
                "lib/index.js",
                "lib/index.js#Padder",
                "lib/index.js#Padder.create",
                "lib/index.js#Padder.left",
                "lib/index.js#VERSION",
                "lib/index.js#pad",
                "lib/index.js#right",
                "lib/pad.js",
                "lib/pad.js#pad",
                "root",
            ]
        );
        assert!(graph.verify().is_empty(), "{:?}", graph.verify());

        let module = graph.item("lib/index.js").unwrap();
        assert_eq!(module.kind, "module");
        assert_eq!(module.name, "lib");
        assert!(module.home);
        assert_eq!(graph.home(), Some("lib/index.js"));

        let left = graph.item("lib/index.js#Padder.left").unwrap();
        assert_eq!(left.kind, "method");
        assert_eq!(left.groups, vec!["lib/index.js#Padder"]);
        assert_eq!(left.attr("params"), Some(&json!("(s, n)")));
        assert_eq!(left.attr("doc"), Some(&json!("Pad left.")));
        assert_eq!(graph.item("lib/index.js#Padder.create").unwrap().attr("static"), Some(&json!(true)));

        let right = graph.item("lib/index.js#right").unwrap();
        assert_eq!(right.kind, "function");
        assert_eq!(right.attr("params"), Some(&json!("(s)")));

        let version = graph.item("lib/index.js#VERSION").unwrap();
        assert_eq!(version.kind, "variable");
        assert_eq!(version.attr("declaration"), Some(&json!("const")));

        let pad = graph.item("lib/pad.js#pad").unwrap();
        assert_eq!(pad.attr("params"), Some(&json!("(s, n = 1)")));
    }

    #[test]
    fn test_required_modules_are_linked() {
        let graph = graph();

        let required = graph.item("lib/index.js#pad").unwrap();
        assert_eq!(required.attr("required"), Some(&json!(true)));
        assert_eq!(required.attr("requires"), Some(&json!("./pad")));
        assert_eq!(required.attr("doc"), Some(&json!("Pads things.")));
        assert_eq!(required.items, vec!["lib/pad.js"]);

        let target = graph.item("lib/pad.js").unwrap();
        assert_eq!(target.groups, vec!["root", "lib/index.js#pad"]);
    }

    #[test]
    fn test_post_processed_report() {
        let mut graph = graph();
        graph.finalize();
        let report = post_process(&graph.report());

        assert_eq!(report.items["lib/index.js"].name, "left-pad");
        assert_eq!(report.items["lib/index.js#pad"].items, vec!["lib/pad.js#pad"]);
        assert_eq!(report.items["lib/pad.js#pad"].groups, vec!["lib/index.js#pad"]);
        assert!(report.items["root"].home_path);
    }

    fn report_for(source: &str) -> ReportGraph {
        let files = vec![SourceFile::new("a.js", source, "javascript")];
        let mut tree = parse_corpus(&files).unwrap();
        transform::run_transform(&mut tree, transform::default_rules()).unwrap();
        let (graph, _) = build_report(&mut tree, default_rules()).unwrap();
        assert!(graph.verify().is_empty(), "{:?}", graph.verify());
        graph
    }

    #[test]
    fn test_accessor_pair_shares_one_item() {
        let graph = report_for("class A {\n  /** Width. */\n  get x() { return 1; }\n  set x(v) {}\n}\n");

        assert_eq!(keys(&graph), vec!["a.js", "a.js#A", "a.js#A.x", "root"]);
        let x = graph.item("a.js#A.x").unwrap();
        assert_eq!(x.attr("get"), Some(&json!(true)));
        assert_eq!(x.attr("set"), Some(&json!(true)));
        assert_eq!(x.attr("doc"), Some(&json!("Width.")));
        assert_eq!(x.attr("params"), Some(&json!("(v)")));
        assert_eq!(graph.item("a.js#A").unwrap().items, vec!["a.js#A.x"]);
    }

    #[test]
    fn test_redeclarations_replace_earlier_items() {
        let graph = report_for("var a = 1;\nvar a = 'two';\nfunction f() {}\nfunction f(x) {}\n");

        assert_eq!(keys(&graph), vec!["a.js", "a.js#a", "a.js#f", "root"]);
        assert_eq!(graph.item("a.js#a").unwrap().attr("line"), Some(&json!(2)));
        assert_eq!(graph.item("a.js#f").unwrap().attr("params"), Some(&json!("(x)")));

        let module = graph.item("a.js").unwrap();
        assert_eq!(module.items, vec!["a.js#a", "a.js#f"]);
        assert_eq!(module.item_type_counts.get("variable"), Some(&1));
        assert_eq!(module.item_type_counts.get("function"), Some(&1));
    }

    #[test]
    fn test_local_classes_with_the_same_name() {
        let graph = report_for(
            "function one() { class Helper { run() {} } }\nfunction two() { class Helper { stop() {} } }\n",
        );

        let helper = graph.item("a.js#Helper").unwrap();
        assert_eq!(helper.kind, "class");
        assert_eq!(helper.items, vec!["a.js#Helper.run", "a.js#Helper.stop"]);
    }

    #[test]
    fn test_object_methods_inside_class_are_not_members() {
        let graph = report_for("class A {\n  m() { return { helper() {} }; }\n  valueOf() { return { valueOf() { return 1; } }; }\n}\n");

        assert_eq!(
            keys(&graph),
            vec!["a.js", "a.js#A", "a.js#A.m", "a.js#A.valueOf", "root"]
        );
        assert_eq!(graph.item("a.js#A").unwrap().items, vec!["a.js#A.m", "a.js#A.valueOf"]);
    }

    #[test]
    fn test_only_entry_module_takes_package_name() {
        let package = PackageInfo {
            name: "left-pad".to_string(),
            version: None,
            description: None,
            main: Some("index.js".to_string()),
        };
        let files: Vec<_> = ["pkg/index.js", "pkg/util.js", "pkg/other.js"]
            .into_iter()
            .map(|path| SourceFile::new(path, "let x = 1;", "javascript").with_package(package.clone()))
            .collect();
        let mut tree = parse_corpus(&files).unwrap();
        transform::run_transform(&mut tree, transform::default_rules()).unwrap();
        let (graph, _) = build_report(&mut tree, default_rules()).unwrap();
        let report = post_process(&graph.report());

        assert_eq!(report.items["pkg/index.js"].name, "left-pad");
        assert_eq!(report.items["pkg/util.js"].name, "util");
        assert_eq!(report.items["pkg/other.js"].name, "other");
        assert_eq!(report.items["pkg/util.js"].attr(PACKAGE_MEMBER_ATTR), Some(&json!("left-pad")));
        assert!(report.items["pkg/util.js"].attr("package").is_none());
        assert_eq!(report.home.as_deref(), Some("pkg/index.js"));
    }

    #[test]
    fn test_resolve_require() {
        let mut graph = ReportGraph::new();
        for key in ["lib/util/index.js", "lib/a.js", "b.js"] {
            graph.add(Item::new(key).with_type("module").with_group(ROOT_GROUP)).unwrap();
        }

        assert_eq!(resolve_require(&graph, "lib/a.js", "./util").as_deref(), Some("lib/util/index.js"));
        assert_eq!(resolve_require(&graph, "lib/a.js", "../b").as_deref(), Some("b.js"));
        assert_eq!(resolve_require(&graph, "lib/a.js", "./a.js").as_deref(), Some("lib/a.js"));
        assert_eq!(resolve_require(&graph, "lib/a.js", "fs"), None);
        assert_eq!(resolve_require(&graph, "b.js", "../../x"), None);
    }
}
